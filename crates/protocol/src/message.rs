use crate::ProtocolError;
use crate::block::{BlockDescriptor, BlockError};
use crate::codec::{decode_uint, encode_uint};
use crate::constants::{Code, MessageKind, OPTION_BLOCK2, OPTION_URI_PATH};
use crate::path::ResourcePath;

/// One option instance: number plus raw value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoapOption {
    pub number: u16,
    pub value: Vec<u8>,
}

/// A request or response message.
///
/// Options are kept sorted by number; repeated options keep their insertion
/// order, which is the order their values are meaningful in (Uri-Path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub code: Code,
    pub message_id: u16,
    pub token: Vec<u8>,
    pub options: Vec<CoapOption>,
    pub payload: Vec<u8>,
}

impl Message {
    /// Creates a message with no token, options or payload.
    pub fn new(kind: MessageKind, code: Code, message_id: u16) -> Self {
        Self {
            kind,
            code,
            message_id,
            token: Vec::new(),
            options: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// Creates a GET request for `path`.
    pub fn get(kind: MessageKind, message_id: u16, token: &[u8], path: &ResourcePath) -> Self {
        let mut msg = Message::new(kind, Code::GET, message_id);
        msg.token = token.to_vec();
        for segment in path.segments() {
            msg.add_option(OPTION_URI_PATH, segment.as_bytes().to_vec());
        }
        msg
    }

    /// Inserts an option after any existing options with the same or lower number.
    pub fn add_option(&mut self, number: u16, value: Vec<u8>) {
        let index = self.options.partition_point(|opt| opt.number <= number);
        self.options.insert(index, CoapOption { number, value });
    }

    /// Replaces all instances of `number` with a single unsigned value.
    pub fn set_uint_option(&mut self, number: u16, value: u32) {
        self.remove_options(number);
        self.add_option(number, encode_uint(value));
    }

    pub fn remove_options(&mut self, number: u16) {
        self.options.retain(|opt| opt.number != number);
    }

    /// First value of option `number`.
    pub fn option(&self, number: u16) -> Option<&[u8]> {
        self.option_values(number).next()
    }

    /// All values of option `number`, in order.
    pub fn option_values(&self, number: u16) -> impl Iterator<Item = &[u8]> {
        self.options
            .iter()
            .filter(move |opt| opt.number == number)
            .map(|opt| opt.value.as_slice())
    }

    /// First value of option `number` decoded as an unsigned integer.
    pub fn uint_option(&self, number: u16) -> Result<Option<u32>, ProtocolError> {
        match self.option(number) {
            Some(value) => decode_uint(value).map(Some).ok_or_else(|| {
                ProtocolError::InvalidOption(format!(
                    "option {number} too long for uint: {} bytes",
                    value.len()
                ))
            }),
            None => Ok(None),
        }
    }

    /// Target path assembled from the Uri-Path options.
    pub fn uri_path(&self) -> Result<ResourcePath, ProtocolError> {
        let segments = self
            .option_values(OPTION_URI_PATH)
            .map(|value| {
                String::from_utf8(value.to_vec())
                    .map_err(|e| ProtocolError::InvalidPath(format!("invalid UTF-8 segment: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        ResourcePath::from_segments(segments)
    }

    /// Parsed Block2 option, if present.
    pub fn block2(&self) -> Result<Option<BlockDescriptor>, BlockError> {
        self.option(OPTION_BLOCK2)
            .map(BlockDescriptor::parse)
            .transpose()
    }

    /// Replaces the Block2 option.
    pub fn set_block2(&mut self, block: &BlockDescriptor) -> Result<(), BlockError> {
        let value = block.serialize()?;
        self.remove_options(OPTION_BLOCK2);
        self.add_option(OPTION_BLOCK2, value);
        Ok(())
    }

    /// Code 0.00.
    pub fn is_empty(&self) -> bool {
        self.code == Code::EMPTY
    }

    /// Creates a response to this request.
    ///
    /// Confirmable requests get a piggybacked acknowledgement echoing the
    /// message id; anything else gets a non-confirmable response carrying
    /// `fresh_id`. The token is always echoed.
    pub fn response(&self, code: Code, fresh_id: u16) -> Message {
        let (kind, message_id) = match self.kind {
            MessageKind::Confirmable => (MessageKind::Acknowledgement, self.message_id),
            _ => (MessageKind::NonConfirmable, fresh_id),
        };
        let mut msg = Message::new(kind, code, message_id);
        msg.token = self.token.clone();
        msg
    }

    /// Creates an empty reset for this message.
    pub fn reset(&self) -> Message {
        Message::new(MessageKind::Reset, Code::EMPTY, self.message_id)
    }
}
