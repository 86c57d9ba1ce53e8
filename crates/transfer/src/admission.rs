//! Admission and validation of block-wise read requests.
//!
//! [`admit`] is a pure function of the current session and the parsed
//! request. It returns what to do with the request and the session to keep
//! afterwards; the engine performs the read and commits the result.
//!
//! Order of checks:
//!
//! 1. While a transfer is active, a request for another resource, or one that
//!    is not a plain read, is refused with 5.03 and the transfer is kept.
//!    While idle, only elective extra options are tolerated; anything else
//!    that is not a plain read is refused with 4.05 or 4.00.
//! 2. A fresh start (no Block2, or Block2 with sequence 0) negotiates a new
//!    transfer, replacing any session for the same resource. An unsupported
//!    size is refused with 4.00 and nothing changes.
//! 3. A continuation must name the expected sequence number and the
//!    negotiated size. An unsupported size at the expected sequence aborts the
//!    transfer; a supported but different size is refused without aborting.
//! 4. A non-zero sequence number with no transfer in progress is refused with
//!    4.08.

use blockwise_protocol::{Code, ResourcePath, is_allowed_size};

use crate::request::{BlockRequest, Foreign};
use crate::session::TransferSession;

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("malformed option: {0}")]
    MalformedOption(String),

    #[error("block size {size} is not allowed")]
    InvalidBlockSize { size: u16, aborted: bool },

    #[error("block size {requested} does not match negotiated {negotiated}")]
    UnexpectedBlockSize { requested: u16, negotiated: u16 },

    #[error("block {seq_num} requested with no transfer in progress")]
    OutOfOrderStart { seq_num: u32 },

    #[error("block {seq_num} requested, expected {expected}")]
    OutOfOrder { seq_num: u32, expected: u32 },

    #[error("transfer of {active} in progress")]
    Conflict { active: ResourcePath },

    #[error("not a block-wise read: {0:?}")]
    Unsupported(Foreign),
}

impl Rejection {
    /// Response code sent for this rejection.
    pub fn code(&self) -> Code {
        match self {
            Rejection::MalformedOption(_)
            | Rejection::InvalidBlockSize { .. }
            | Rejection::UnexpectedBlockSize { .. } => Code::BAD_REQUEST,
            Rejection::OutOfOrderStart { .. } | Rejection::OutOfOrder { .. } => {
                Code::REQUEST_ENTITY_INCOMPLETE
            }
            Rejection::Conflict { .. } => Code::SERVICE_UNAVAILABLE,
            Rejection::Unsupported(Foreign::Method(_)) => Code::METHOD_NOT_ALLOWED,
            Rejection::Unsupported(_) => Code::BAD_REQUEST,
        }
    }

    /// Returns `true` if this rejection ends the active transfer.
    pub fn aborts(&self) -> bool {
        matches!(self, Rejection::InvalidBlockSize { aborted: true, .. })
    }
}

/// What to do with an admitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Read and send block `seq_num` of `block_size` bytes.
    Emit {
        seq_num: u32,
        block_size: u16,
        fresh: bool,
    },
    /// Send an error response.
    Reject(Rejection),
}

/// Outcome of [`admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub decision: Decision,
    /// Session after the decision. For [`Decision::Emit`] it expects the
    /// block being emitted; the engine advances it once the read succeeds.
    pub next: Option<TransferSession>,
}

impl Admission {
    fn emit(session: TransferSession, fresh: bool) -> Self {
        Self {
            decision: Decision::Emit {
                seq_num: session.expected_seq(),
                block_size: session.block_size(),
                fresh,
            },
            next: Some(session),
        }
    }

    fn reject(rejection: Rejection, next: Option<TransferSession>) -> Self {
        Self {
            decision: Decision::Reject(rejection),
            next,
        }
    }
}

/// Decides how to answer `request` given the current `session`.
///
/// `default_block_size` is adopted when a fresh start names no size; it must
/// itself be an allowed size.
pub fn admit(
    session: Option<&TransferSession>,
    request: &BlockRequest,
    default_block_size: u16,
) -> Admission {
    let unchanged = session.cloned();

    let conflicting =
        session.filter(|active| !active.serves(&request.resource) || request.foreign.is_some());
    if let Some(active) = conflicting {
        return Admission::reject(
            Rejection::Conflict {
                active: active.resource().clone(),
            },
            unchanged,
        );
    }
    if let Some(foreign) = request.foreign.filter(|foreign| !foreign.is_elective()) {
        return Admission::reject(Rejection::Unsupported(foreign), unchanged);
    }

    let Some(block) = request.block2 else {
        return Admission::emit(
            TransferSession::new(request.resource.clone(), default_block_size),
            true,
        );
    };

    if block.seq_num == 0 {
        if !is_allowed_size(block.block_size) {
            return Admission::reject(
                Rejection::InvalidBlockSize {
                    size: block.block_size,
                    aborted: false,
                },
                unchanged,
            );
        }
        return Admission::emit(
            TransferSession::new(request.resource.clone(), block.block_size),
            true,
        );
    }

    let allowed = is_allowed_size(block.block_size);
    let Some(active) = session else {
        let rejection = if allowed {
            Rejection::OutOfOrderStart {
                seq_num: block.seq_num,
            }
        } else {
            Rejection::InvalidBlockSize {
                size: block.block_size,
                aborted: false,
            }
        };
        return Admission::reject(rejection, None);
    };

    if block.seq_num != active.expected_seq() {
        let rejection = if allowed {
            Rejection::OutOfOrder {
                seq_num: block.seq_num,
                expected: active.expected_seq(),
            }
        } else {
            Rejection::InvalidBlockSize {
                size: block.block_size,
                aborted: false,
            }
        };
        return Admission::reject(rejection, unchanged);
    }

    if block.block_size == active.block_size() {
        return Admission::emit(active.clone(), false);
    }
    if !allowed {
        return Admission::reject(
            Rejection::InvalidBlockSize {
                size: block.block_size,
                aborted: true,
            },
            None,
        );
    }
    Admission::reject(
        Rejection::UnexpectedBlockSize {
            requested: block.block_size,
            negotiated: active.block_size(),
        },
        unchanged,
    )
}
