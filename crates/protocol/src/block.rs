//! Block2/Block1 option codec (RFC 7959 section 2.2).
//!
//! ```text
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 NUM                   |M| SZX |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The value is a big-endian unsigned integer of 0 to 3 bytes. Block size is
//! `2^(SZX + 4)`. SZX 7 decodes to 2048: the bit pattern is well-formed, but the
//! size lies outside the allowed set, which callers check separately with
//! [`is_allowed_size`].

use crate::codec::{decode_uint, encode_uint};

/// Block sizes a transfer may use.
pub const ALLOWED_BLOCK_SIZES: [u16; 7] = [16, 32, 64, 128, 256, 512, 1024];

/// Smallest allowed block size.
pub const MIN_BLOCK_SIZE: u16 = 16;

/// Largest allowed block size, also the size adopted when a request names none.
pub const MAX_BLOCK_SIZE: u16 = 1024;

/// Largest sequence number that fits in a 3-byte option.
pub const MAX_SEQ_NUM: u32 = (1 << 20) - 1;

/// Maximum encoded option length.
const MAX_OPTION_LEN: usize = 3;

/// Errors from encoding or decoding a block option.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("block option too long: {0} bytes (max 3)")]
    TooLong(usize),

    #[error("block size {0} has no size exponent")]
    UnencodableSize(u16),

    #[error("sequence number {0} exceeds {MAX_SEQ_NUM}")]
    SeqNumOutOfRange(u32),
}

/// Position, more-flag and size of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockDescriptor {
    pub seq_num: u32,
    pub has_more: bool,
    pub block_size: u16,
}

impl BlockDescriptor {
    pub fn new(seq_num: u32, has_more: bool, block_size: u16) -> Self {
        Self {
            seq_num,
            has_more,
            block_size,
        }
    }

    /// Decodes a raw option value.
    pub fn parse(value: &[u8]) -> Result<Self, BlockError> {
        if value.len() > MAX_OPTION_LEN {
            return Err(BlockError::TooLong(value.len()));
        }
        let raw = decode_uint(value).ok_or(BlockError::TooLong(value.len()))?;
        let szx = (raw & 0x07) as u8;
        Ok(Self {
            seq_num: raw >> 4,
            has_more: raw & 0x08 != 0,
            block_size: size_from_szx(szx),
        })
    }

    /// Encodes into a minimal-length option value.
    pub fn serialize(&self) -> Result<Vec<u8>, BlockError> {
        if self.seq_num > MAX_SEQ_NUM {
            return Err(BlockError::SeqNumOutOfRange(self.seq_num));
        }
        let szx = szx_from_size(self.block_size)?;
        let raw = (self.seq_num << 4) | (u32::from(self.has_more) << 3) | u32::from(szx);
        Ok(encode_uint(raw))
    }
}

/// True iff `size` is a power of two in `[16, 1024]`.
pub fn is_allowed_size(size: u16) -> bool {
    size.is_power_of_two() && (MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&size)
}

fn size_from_szx(szx: u8) -> u16 {
    1u16 << (szx + 4)
}

fn szx_from_size(size: u16) -> Result<u8, BlockError> {
    if !size.is_power_of_two() || !(MIN_BLOCK_SIZE..=2048).contains(&size) {
        return Err(BlockError::UnencodableSize(size));
    }
    Ok((size.trailing_zeros() - 4) as u8)
}
