use blockwise_protocol::ResourcePath;

/// The single block-wise transfer in progress.
///
/// The engine holds at most one of these at a time as an
/// `Option<TransferSession>`; `None` is the idle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSession {
    resource: ResourcePath,
    block_size: u16,
    expected_seq: u32,
}

impl TransferSession {
    /// A session about to emit block 0.
    pub fn new(resource: ResourcePath, block_size: u16) -> Self {
        Self::at(resource, block_size, 0)
    }

    /// A session about to emit block `seq_num`.
    pub fn at(resource: ResourcePath, block_size: u16, seq_num: u32) -> Self {
        Self {
            resource,
            block_size,
            expected_seq: seq_num,
        }
    }

    pub fn resource(&self) -> &ResourcePath {
        &self.resource
    }

    /// Negotiated block size.
    pub fn block_size(&self) -> u16 {
        self.block_size
    }

    /// Sequence number the next continuation must carry.
    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    /// Returns `true` if this session serves `resource`.
    pub fn serves(&self, resource: &ResourcePath) -> bool {
        &self.resource == resource
    }

    /// State after emitting the expected block.
    ///
    /// Returns `None` when that block was the last one.
    pub fn advance(self, has_more: bool) -> Option<Self> {
        has_more.then(|| Self {
            expected_seq: self.expected_seq + 1,
            ..self
        })
    }
}
