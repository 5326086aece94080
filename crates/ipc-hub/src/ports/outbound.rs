//! # Driven Ports (Outbound SPI)
//!
//! These are the interfaces a node **requires** from its host: a transport
//! for its role and a sink for diagnostic lines.
//!
//! ## Event Delivery
//!
//! `listen`/`connect` hand back an unbounded receiver of transport events.
//! The node drains it on a single driver task, so events from one
//! connection are routed in the order the transport produced them.
//!
//! ## Sending
//!
//! `send` and `broadcast` are synchronous and must not block: the node
//! calls them while holding its routing lock. Implementations enqueue onto
//! per-connection writers.

use async_trait::async_trait;
use shared_types::{ConnectionId, Envelope, PeerId, RawEnvelope};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Events a server transport reports.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A connection was accepted.
    Connected(ConnectionId),
    /// A connection delivered an envelope.
    Message(RawEnvelope, ConnectionId),
    /// A connection closed.
    Disconnected(ConnectionId),
    /// The listening endpoint is gone. Always the last event.
    Destroyed,
}

/// Events a client transport reports.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The connection to the server was (re)established.
    Connected,
    /// The server delivered an envelope.
    Message(RawEnvelope),
    /// The connection to the server was lost. The transport may reconnect.
    Disconnected,
    /// The transport gave up or was disconnected. Always the last event.
    Destroyed,
}

/// Stream of server transport events.
pub type ServerEvents = mpsc::UnboundedReceiver<ServerEvent>;

/// Stream of client transport events.
pub type ClientEvents = mpsc::UnboundedReceiver<ClientEvent>;

/// Errors from transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Another server already listens on the address.
    #[error("Address already in use: {0}")]
    AddressInUse(String),

    /// Nothing listens on the address.
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// The connection or endpoint is closed.
    #[error("Transport closed")]
    Closed,

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Transport used by the server role.
#[async_trait]
pub trait ServerTransport: Send + Sync {
    /// Start accepting connections at `address`.
    ///
    /// Resolves once the transport is accepting. Fails with
    /// [`TransportError::AddressInUse`] if the address is taken.
    async fn listen(&self, address: &str) -> Result<ServerEvents, TransportError>;

    /// Send an envelope to one connection.
    fn send(&self, connection: ConnectionId, envelope: &Envelope) -> Result<(), TransportError>;

    /// Send an envelope to every live connection.
    fn broadcast(&self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Close the listening endpoint and every connection.
    fn close(&self);
}

/// Transport used by the client role.
#[async_trait]
pub trait ClientTransport: Send + Sync {
    /// Connect to the server at `address`.
    ///
    /// Resolves once the first connection attempt has been made. After a
    /// disconnect the transport retries every `retry` until
    /// [`ClientTransport::disconnect`] is called.
    async fn connect(&self, address: &str, retry: Duration) -> Result<ClientEvents, TransportError>;

    /// Send an envelope to the server.
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Drop the connection and stop reconnecting.
    fn disconnect(&self);
}

/// Destination for a node's diagnostic lines.
///
/// Only consulted when the node is configured with `silent == false`.
pub trait LogSink: Send + Sync {
    fn log(&self, node: &PeerId, line: &str);
}
