use std::collections::VecDeque;
use std::net::SocketAddr;

use blockwise_protocol::{CoapOption, Code, Message, MessageKind};

/// Everything that makes two requests exact duplicates of each other.
///
/// The Uri-Path options are part of `options`, so the target path and any
/// Block2 descriptor both take part in the comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestSignature {
    peer: SocketAddr,
    kind: MessageKind,
    code: Code,
    message_id: u16,
    token: Vec<u8>,
    options: Vec<CoapOption>,
}

impl RequestSignature {
    pub fn of(peer: SocketAddr, request: &Message) -> Self {
        Self {
            peer,
            kind: request.kind,
            code: request.code,
            message_id: request.message_id,
            token: request.token.clone(),
            options: request.options.clone(),
        }
    }
}

/// Most recently sent responses, keyed by the request that produced them.
///
/// Holds `capacity` entries; storing beyond that evicts the oldest.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    entries: VecDeque<(RequestSignature, Message)>,
    capacity: usize,
}

impl ResponseCache {
    /// Creates a cache holding up to `capacity` responses (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// The response previously sent for an identical request.
    pub fn lookup(&self, signature: &RequestSignature) -> Option<&Message> {
        self.entries
            .iter()
            .rev()
            .find(|(sig, _)| sig == signature)
            .map(|(_, response)| response)
    }

    /// Remembers `response` as the answer to `signature`.
    pub fn store(&mut self, signature: RequestSignature, response: Message) {
        self.entries.retain(|(sig, _)| sig != &signature);
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((signature, response));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
