//! UDP server for the block-wise response engine.
//!
//! Receives CoAP datagrams, feeds requests one at a time to a
//! [`BlockEngine`](blockwise_transfer::BlockEngine) and sends back whatever
//! it answers.

pub mod server;

pub use server::{BlockServer, ServerConfig};

use std::net::{IpAddr, Ipv4Addr};

/// Default CoAP port.
pub const DEFAULT_PORT: u16 = 5683;

/// Default bind address.
pub const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Receive buffer size. Larger datagrams are truncated and then fail to decode.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Errors produced by the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
