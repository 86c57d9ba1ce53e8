use std::net::SocketAddr;

use tracing::{debug, info, warn};

use blockwise_protocol::{Code, Message, ResourcePath, is_allowed_size};

use crate::TransferError;
use crate::admission::{Decision, Rejection, admit};
use crate::cache::{RequestSignature, ResponseCache};
use crate::request::classify;
use crate::response::{content_response, error_response};
use crate::session::TransferSession;
use crate::source::ResourceSource;
use crate::window::read_window;

/// Max-Age (seconds) advertised on 5.03 responses.
pub const DEFAULT_BUSY_MAX_AGE: u32 = 5;

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Block size adopted when a fresh start names none. Must be allowed.
    pub default_block_size: u16,
    /// Number of responses kept for retransmission replay.
    pub cache_capacity: usize,
    /// Max-Age sent with 5.03 responses (`None` omits the option).
    pub busy_max_age: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_block_size: crate::DEFAULT_BLOCK_SIZE,
            cache_capacity: 1,
            busy_max_age: Some(DEFAULT_BUSY_MAX_AGE),
        }
    }
}

/// Block-wise response engine.
///
/// Owns the single transfer session and the retransmission cache. Requests
/// are handled strictly one at a time through [`handle`](Self::handle);
/// callers sharing the engine across tasks must wrap it in one lock.
pub struct BlockEngine<S> {
    source: S,
    config: EngineConfig,
    session: Option<TransferSession>,
    cache: ResponseCache,
    next_message_id: u16,
}

impl<S: ResourceSource> BlockEngine<S> {
    /// Creates an idle engine reading resources from `source`.
    pub fn new(source: S, config: EngineConfig) -> Result<Self, TransferError> {
        if !is_allowed_size(config.default_block_size) {
            return Err(TransferError::InvalidConfig(format!(
                "default block size {} is not a power of two in [16, 1024]",
                config.default_block_size
            )));
        }
        Ok(Self {
            source,
            cache: ResponseCache::new(config.cache_capacity),
            config,
            session: None,
            next_message_id: rand::random(),
        })
    }

    /// Produces the response to `request` received from `peer`.
    ///
    /// An exact retransmission of a recently answered request gets the same
    /// response back without touching the session.
    pub fn handle(&mut self, peer: SocketAddr, request: &Message) -> Message {
        let signature = RequestSignature::of(peer, request);
        if let Some(cached) = self.cache.lookup(&signature) {
            debug!(
                %peer,
                message_id = request.message_id,
                token = %hex::encode(&request.token),
                "replaying response to retransmitted request"
            );
            return cached.clone();
        }

        let response = self.respond(request);
        self.cache.store(signature, response.clone());
        response
    }

    /// The transfer in progress, if any.
    pub fn session(&self) -> Option<&TransferSession> {
        self.session.as_ref()
    }

    /// Drops the session and the cache. Clients must restart from block 0.
    pub fn reset(&mut self) {
        if let Some(session) = self.session.take() {
            info!(resource = %session.resource(), "discarding block-wise transfer");
        }
        self.cache.clear();
    }

    fn respond(&mut self, request: &Message) -> Message {
        let parsed = match classify(request) {
            Ok(parsed) => parsed,
            Err(rejection) => return self.reject(request, rejection),
        };

        let admission = admit(
            self.session.as_ref(),
            &parsed,
            self.config.default_block_size,
        );
        match admission.decision {
            Decision::Reject(rejection) => {
                if rejection.aborts() {
                    warn!(resource = %parsed.resource, "aborting block-wise transfer: {rejection}");
                }
                self.session = admission.next;
                self.reject(request, rejection)
            }
            Decision::Emit {
                seq_num,
                block_size,
                fresh,
            } => self.emit(
                request,
                &parsed.resource,
                seq_num,
                block_size,
                fresh,
                admission.next,
            ),
        }
    }

    fn emit(
        &mut self,
        request: &Message,
        resource: &ResourcePath,
        seq_num: u32,
        block_size: u16,
        fresh: bool,
        next: Option<TransferSession>,
    ) -> Message {
        let offset = u64::from(seq_num) * u64::from(block_size);
        let window = match read_window(&self.source, resource, offset, usize::from(block_size)) {
            Ok(window) => window,
            Err(TransferError::ResourceUnavailable(path)) => {
                debug!(resource = %path, "resource not found");
                return self.error(request, Code::NOT_FOUND, None);
            }
            Err(e) => {
                warn!(%resource, "failed to read resource: {e}");
                return self.error(request, Code::INTERNAL_SERVER_ERROR, None);
            }
        };

        let has_more = !window.reached_end;
        let fresh_id = self.allocate_message_id();
        let response = match content_response(request, fresh_id, seq_num, block_size, window) {
            Ok(response) => response,
            Err(e) => {
                warn!(%resource, seq_num, "cannot encode block option: {e}");
                return self.error(request, Code::INTERNAL_SERVER_ERROR, None);
            }
        };

        if fresh {
            info!(%resource, block_size, "block-wise transfer started");
        }
        self.session = next.and_then(|session| session.advance(has_more));
        if has_more {
            debug!(%resource, seq_num, block_size, "block sent");
        } else {
            info!(%resource, blocks = seq_num + 1, "block-wise transfer complete");
        }
        response
    }

    fn reject(&mut self, request: &Message, rejection: Rejection) -> Message {
        let code = rejection.code();
        debug!(code = %code, message_id = request.message_id, "request rejected: {rejection}");
        let max_age = if code == Code::SERVICE_UNAVAILABLE {
            self.config.busy_max_age
        } else {
            None
        };
        self.error(request, code, max_age)
    }

    fn error(&mut self, request: &Message, code: Code, max_age: Option<u32>) -> Message {
        let fresh_id = self.allocate_message_id();
        error_response(request, fresh_id, code, max_age)
    }

    fn allocate_message_id(&mut self) -> u16 {
        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);
        id
    }
}
