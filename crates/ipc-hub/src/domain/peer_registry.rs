//! # Peer Registry
//!
//! Maps handshaken peer identifiers to live connections, in both directions.
//!
//! ## Lifecycle
//!
//! ```text
//! accept ──→ pending ──handshake──→ registered ──disconnect──→ (gone)
//!                │                                   ↑
//!                └──────────── disconnect ───────────┘  (anomalous: no id)
//! ```
//!
//! At most one entry exists per identifier and per connection. A second
//! handshake under the same identifier replaces the earlier connection.

use shared_types::{ConnectionId, PeerId};
use std::collections::{HashMap, HashSet};

/// Bidirectional peer ↔ connection map.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    by_peer: HashMap<PeerId, ConnectionId>,
    by_connection: HashMap<ConnectionId, PeerId>,
    /// Accepted connections that have not handshaken yet.
    pending: HashSet<ConnectionId>,
}

/// What a registration replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    /// Connection previously registered under the same identifier.
    pub replaced_connection: Option<ConnectionId>,
    /// Identifier previously registered on the same connection.
    pub replaced_peer: Option<PeerId>,
}

impl Registration {
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.replaced_connection.is_none() && self.replaced_peer.is_none()
    }
}

impl PeerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted connection awaiting its handshake.
    pub fn track_pending(&mut self, connection: ConnectionId) {
        if !self.by_connection.contains_key(&connection) {
            self.pending.insert(connection);
        }
    }

    /// Register `peer` on `connection`, overwriting any previous mapping of either.
    pub fn register(&mut self, peer: PeerId, connection: ConnectionId) -> Registration {
        self.pending.remove(&connection);

        let replaced_connection = self
            .by_peer
            .insert(peer.clone(), connection)
            .filter(|old| *old != connection);
        if let Some(old) = replaced_connection {
            self.by_connection.remove(&old);
        }

        let replaced_peer = self
            .by_connection
            .insert(connection, peer.clone())
            .filter(|old| *old != peer);
        if let Some(old) = &replaced_peer {
            self.by_peer.remove(old);
        }

        Registration {
            replaced_connection,
            replaced_peer,
        }
    }

    /// Resolve a peer to its connection. A miss is not an error.
    #[must_use]
    pub fn lookup(&self, peer: &str) -> Option<ConnectionId> {
        self.by_peer.get(peer).copied()
    }

    /// Drop whatever is known about `connection`.
    ///
    /// Returns the identifier it was registered under, or `None` if it never
    /// completed a handshake.
    pub fn unregister(&mut self, connection: ConnectionId) -> Option<PeerId> {
        self.pending.remove(&connection);
        let peer = self.by_connection.remove(&connection)?;
        self.by_peer.remove(&peer);
        Some(peer)
    }

    #[must_use]
    pub fn is_pending(&self, connection: ConnectionId) -> bool {
        self.pending.contains(&connection)
    }

    #[must_use]
    pub fn contains(&self, peer: &str) -> bool {
        self.by_peer.contains_key(peer)
    }

    /// Number of registered peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_peer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_peer.is_empty()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Registered peers, sorted by identifier.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.by_peer.keys().cloned().collect();
        peers.sort();
        peers
    }
}
