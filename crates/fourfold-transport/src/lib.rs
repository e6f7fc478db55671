//! Transport layer for Fourfold.
//!
//! Accepts TCP connections, upgrades them to WebSocket after letting the
//! caller inspect the request query, and splits each connection into a
//! sending half and a receiving half so that reads and writes run in
//! separate tasks.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    PendingConnection, WebSocketConnection, WebSocketListener, WebSocketReceiver,
    WebSocketSender,
};

use std::fmt;

/// Opaque identifier for a connection.
///
/// Ids are unique for the lifetime of the process, so two connections
/// that share a participant identity can still be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
