//! The `Transport` capability boundary (spec §6.1).
//!
//! The core consumes transport as a trait; concrete carriers (UDP socket
//! pools, TCP/TLS streams, WebSocket) are an application concern and are
//! not implemented here. [`mock`] provides an in-memory transport used by
//! the crate's own tests.

pub mod mock;

use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;

pub use crate::error::{TransportError, TransportErrorKind};
use crate::message::Message;

/// Maximum UDP datagram payload accepted on a datagram transport
/// (spec §6.1).
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// A transport-layer peer address. `transport` names the carrier
/// (`"UDP"`, `"TCP"`, `"TLS"`, `"WS"`, `"WSS"`) so a `Via` header's
/// `sent-by` can be reconstructed without the core knowing about
/// sockets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SipAddr {
    pub addr: SocketAddr,
    pub transport: String,
}

impl SipAddr {
    pub fn new(addr: SocketAddr, transport: impl Into<String>) -> Self {
        SipAddr {
            addr,
            transport: transport.into(),
        }
    }
}

impl fmt::Display for SipAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.transport)
    }
}

/// An inbound message together with where it came from, delivered to
/// the upcall registered through [`Transport::on_message`].
#[derive(Debug, Clone)]
pub struct Incoming {
    pub message: Message,
    pub source: SipAddr,
}

/// The capability boundary the protocol engine consumes (spec §6.1).
/// Implementors own the actual socket/stream plumbing; the core only
/// ever sends fully-built `Message`s and receives fully-parsed ones.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, message: &Message, target: &SipAddr) -> Result<(), TransportError>;

    /// Registers the upcall invoked for every inbound message. Transports
    /// that can only have one subscriber replace any previous handler.
    fn on_message(&self, handler: Box<dyn Fn(Incoming) + Send + Sync>);

    /// Distinguishes stream-oriented carriers (TCP/TLS/WS/WSS) from
    /// datagram ones (UDP) — governs timer collapse (spec §3.6) and
    /// whether a missing Content-Length is an error (spec §4.1).
    fn is_reliable(&self) -> bool;
}
