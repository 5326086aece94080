//! # Transport Adapters
//!
//! Concrete implementations of the outbound ports.
//!
//! - `memory` - in-process transport (always available)
//! - `unix` - Unix domain socket transport (feature: `network`)
//! - `tracing_sink` - default log sink

pub mod memory;
pub mod tracing_sink;

#[cfg(feature = "network")]
pub mod unix;

pub use memory::{MemoryClientTransport, MemoryNetwork, MemoryServerTransport, NetworkStats};
pub use tracing_sink::TracingLogSink;

#[cfg(feature = "network")]
pub use unix::{UnixClientTransport, UnixServerTransport};
