//! # IPC Hub
//!
//! A hub-and-spoke publish/subscribe router for local IPC. One server node,
//! many client nodes; every message passes through the server.
//!
//! ## Addressing
//!
//! - `$all` reaches every connected peer (and is re-broadcast by the server)
//! - a peer identifier reaches that peer only
//! - a node's own identifier is delivered locally, without touching the network
//!
//! ## Sticky Topics
//!
//! The server retains the latest message of every sticky topic and replays
//! them, oldest first, to each client right after its `$hello` handshake.
//! A sticky write without a message clears the topic.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** peer registry, sticky store, router, lifecycle (no I/O)
//! - **Ports Layer:** `EventEmitterApi` inbound; transports and log sink outbound
//! - **Service Layer:** `ServerNode` and `ClientNode` drive the router
//! - **Adapters Layer:** in-memory and Unix socket transports
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ipc_hub::{ClientNode, EventEmitterApi, HubConfig, MemoryNetwork, Payload, ServerNode};
//!
//! # async fn run() -> Result<(), ipc_hub::HubError> {
//! let network = MemoryNetwork::new();
//! let config = HubConfig::default().with_socket_path("demo");
//!
//! let server = ServerNode::new(config.clone(), Arc::new(network.server()));
//! server.start().await?;
//! server.emit(Payload::from("green"), Some("status".into()), true)?;
//!
//! // Receives "green" on "status" right after connecting.
//! let client = ClientNode::new(config, Arc::new(network.client()));
//! client.start().await?;
//! # Ok(())
//! # }
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// =============================================================================
// ADAPTERS (unix socket transport requires feature: `network`)
// =============================================================================

pub mod adapters;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use adapters::{
    MemoryClientTransport, MemoryNetwork, MemoryServerTransport, NetworkStats, TracingLogSink,
};
#[cfg(feature = "network")]
pub use adapters::{UnixClientTransport, UnixServerTransport};
pub use config::{HubConfig, DEFAULT_RETRY, DEFAULT_SOCKET_PATH};
pub use domain::{ClientState, HubError, PeerRegistry, ServerState, StickyStore};
pub use ports::{
    ClientEvent, ClientTransport, EventEmitterApi, LogSink, ServerEvent, ServerTransport,
    TransportError,
};
pub use service::{ClientNode, ServerNode};

pub use shared_bus::{
    Channel, HandlerId, Notification, NotificationFilter, NotificationStream, Subscription,
};
pub use shared_types::{ConnectionId, Envelope, Payload, PeerId, RawEnvelope};
