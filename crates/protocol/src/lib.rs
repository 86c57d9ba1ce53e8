//! Message vocabulary for block-wise transfers over datagrams.
//!
//! Covers the subset of CoAP (RFC 7252) and its block-wise extension
//! (RFC 7959) that a block-wise responder needs: message headers, response
//! codes, option numbers, the Block option codec and resource paths.

pub mod block;
pub mod codec;
pub mod constants;
pub mod message;
pub mod path;

pub use block::{BlockDescriptor, BlockError, is_allowed_size};
pub use constants::{Code, MessageKind};
pub use message::{CoapOption, Message};
pub use path::ResourcePath;

/// Errors produced by the protocol crate.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("datagram too short: {0} bytes")]
    TooShort(usize),

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid token length: {0}")]
    InvalidTokenLength(usize),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("payload marker followed by empty payload")]
    EmptyPayloadAfterMarker,

    #[error("empty message carries token, options or payload")]
    InvalidEmptyMessage,

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
