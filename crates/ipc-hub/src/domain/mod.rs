//! Domain Layer - Pure routing logic with no I/O
//!
//! This module contains the core hub logic including:
//! - Peer registry (identifier ↔ connection)
//! - Sticky store (latest value per topic, replayed on join)
//! - Router (classification, sticky writes, fan-out decisions)
//! - Node lifecycle state machines

pub mod errors;
pub mod lifecycle;
pub mod peer_registry;
pub mod router;
pub mod sticky_store;

pub use errors::*;
pub use lifecycle::*;
pub use peer_registry::*;
pub use router::*;
pub use sticky_store::*;
