//! Datagram loop.
//!
//! Binds a UDP socket and answers each datagram before reading the next, so
//! the engine sees requests strictly in arrival order.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use blockwise_protocol::{Message, MessageKind, codec};
use blockwise_transfer::{BlockEngine, ResourceSource};

use crate::{DEFAULT_BIND, DEFAULT_PORT, MAX_DATAGRAM_SIZE, ServerError};

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind: IpAddr,
    /// UDP port to listen on (0 = OS-assigned).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            port: DEFAULT_PORT,
        }
    }
}

/// UDP server wrapping a [`BlockEngine`].
pub struct BlockServer<S> {
    socket: UdpSocket,
    local_addr: SocketAddr,
    engine: Mutex<BlockEngine<S>>,
    cancel: CancellationToken,
}

impl<S: ResourceSource + 'static> BlockServer<S> {
    /// Binds the socket described by `config`.
    pub async fn bind(config: &ServerConfig, engine: BlockEngine<S>) -> Result<Arc<Self>, ServerError> {
        let socket = UdpSocket::bind((config.bind, config.port)).await?;
        let local_addr = socket.local_addr()?;
        info!("block-wise server listening on {local_addr}");

        Ok(Arc::new(Self {
            socket,
            local_addr,
            engine: Mutex::new(engine),
            cancel: CancellationToken::new(),
        }))
    }

    /// Returns the address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The engine, for inspection or reset between requests.
    pub fn engine(&self) -> &Mutex<BlockEngine<S>> {
        &self.engine
    }

    /// Stops [`run`](Self::run) at the next opportunity.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Serves datagrams until [`shutdown`](Self::shutdown).
    pub async fn run(&self) -> Result<(), ServerError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("server shutting down");
                    break Ok(());
                }

                result = self.socket.recv_from(&mut buf) => {
                    let (len, peer) = match result {
                        Ok(received) => received,
                        Err(e) => {
                            warn!("receive error: {e}");
                            continue;
                        }
                    };
                    let Some(reply) = self.handle_datagram(peer, &buf[..len]).await else {
                        continue;
                    };
                    if let Err(e) = self.socket.send_to(&reply, peer).await {
                        warn!(%peer, "send error: {e}");
                    }
                }
            }
        }
    }

    /// Computes the reply to one datagram, if it deserves one.
    pub async fn handle_datagram(&self, peer: SocketAddr, datagram: &[u8]) -> Option<Vec<u8>> {
        let message = match codec::decode(datagram) {
            Ok(message) => message,
            Err(e) => {
                match codec::peek_header(datagram) {
                    Ok((kind, message_id)) => {
                        warn!(%peer, ?kind, message_id, "dropping undecodable message: {e}")
                    }
                    Err(_) => warn!(%peer, len = datagram.len(), "dropping datagram: {e}"),
                }
                return None;
            }
        };

        let reply = match self.classify(peer, &message) {
            Incoming::Request => {
                debug!(
                    %peer,
                    code = %message.code,
                    message_id = message.message_id,
                    token = %hex::encode(&message.token),
                    "request received"
                );
                self.engine.lock().await.handle(peer, &message)
            }
            Incoming::Reject => message.reset(),
            Incoming::Ignore => return None,
        };

        match codec::encode(&reply) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(%peer, "cannot encode reply: {e}");
                None
            }
        }
    }

    fn classify(&self, peer: SocketAddr, message: &Message) -> Incoming {
        if message.code.is_request() {
            return match message.kind {
                MessageKind::Confirmable | MessageKind::NonConfirmable => Incoming::Request,
                _ => {
                    debug!(%peer, kind = ?message.kind, "ignoring request in acknowledgement or reset");
                    Incoming::Ignore
                }
            };
        }
        if message.kind == MessageKind::Confirmable {
            debug!(%peer, code = %message.code, "rejecting confirmable non-request");
            return Incoming::Reject;
        }
        Incoming::Ignore
    }
}

enum Incoming {
    Request,
    Reject,
    Ignore,
}
