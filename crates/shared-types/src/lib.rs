//! # Shared Types Crate
//!
//! This crate contains the wire envelope, peer identities and the reserved
//! protocol values used by every node in the hub.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate types are defined here.
//! - **Validate at the Boundary**: Transports hand the router a [`RawEnvelope`];
//!   only a validated [`Envelope`] takes part in routing decisions.
//! - **Envelope Identity**: The envelope's `sender` is authoritative; payloads
//!   carry no identity of their own.

pub mod entities;
pub mod envelope;
pub mod errors;

pub use entities::*;
pub use envelope::{Envelope, Payload, RawEnvelope};
pub use errors::*;

/// Reserved recipient addressing every connected peer.
pub const BROADCAST: &str = "$all";

/// Payload a client sends as its first message to register its identifier.
pub const HANDSHAKE: &str = "$hello";

/// Fixed identifier of the hub server.
pub const SERVER_ID: &str = "server";
