//! Block-wise (Block2) response transfer.
//!
//! [`BlockEngine`] answers CoAP reads of resources larger than one datagram,
//! one block per request, while tracking the single transfer in progress and
//! replaying responses to retransmitted requests.

pub mod admission;
pub mod cache;
pub mod engine;
pub mod request;
pub mod response;
pub mod session;
pub mod source;
pub mod window;

use blockwise_protocol::ResourcePath;

pub use admission::{Admission, Decision, Rejection, admit};
pub use cache::{RequestSignature, ResponseCache};
pub use engine::{BlockEngine, DEFAULT_BUSY_MAX_AGE, EngineConfig};
pub use request::{BlockRequest, Foreign, classify};
pub use session::TransferSession;
pub use source::{
    FileResource, MemoryResource, PatternResource, Resource, ResourceSource, ResourceStream,
    SourceRegistry,
};
pub use window::{Window, read_window};

/// Block size used when a client starts a transfer without naming one.
pub const DEFAULT_BLOCK_SIZE: u16 = blockwise_protocol::block::MAX_BLOCK_SIZE;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("resource not found: {0}")]
    ResourceUnavailable(ResourcePath),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
