//! # Core Identities
//!
//! Peer identifiers and transport connection handles.
//!
//! - **`PeerId`**: stable string identity of a server or client
//! - **`ConnectionId`**: opaque handle a transport assigns to a live connection

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::{BROADCAST, SERVER_ID};

/// Stable identifier of a peer (the server or a client).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Number of random bytes in a generated client identifier.
    pub const RANDOM_BYTES: usize = 4;

    /// Wrap an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random client identifier (8 lowercase hex characters).
    #[must_use]
    pub fn random() -> Self {
        let bytes: [u8; Self::RANDOM_BYTES] = rand::random();
        Self(hex::encode(bytes))
    }

    /// The fixed server identifier.
    #[must_use]
    pub fn server() -> Self {
        Self(SERVER_ID.to_string())
    }

    /// The reserved broadcast identifier.
    #[must_use]
    pub fn broadcast() -> Self {
        Self(BROADCAST.to_string())
    }

    /// Whether this identifier addresses every peer.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.0 == BROADCAST
    }

    /// Whether this is `server` or `$all`; neither may name a client.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.0 == BROADCAST || self.0 == SERVER_ID
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for PeerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PeerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PeerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Opaque handle of a transport connection.
///
/// Transports allocate these; the hub only compares and stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
