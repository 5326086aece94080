//! # Router
//!
//! Decides, for every envelope a node accepts or emits, what happens next.
//! Pure logic: the router returns [`RouteAction`]s and the service layer
//! performs them.
//!
//! ## Classification (in order)
//!
//! 1. Malformed → dropped, nothing else happens.
//! 2. Handshake token on a server → register the sender, raise
//!    `client.connect`, replay every sticky topic to the new peer.
//! 3. Application message → sticky write (server), local notification,
//!    then fan-out (server).
//!
//! ## Local Notifications
//!
//! | envelope                               | notification          |
//! |----------------------------------------|-----------------------|
//! | `sender == own id`                     | none (self-echo)      |
//! | `recipient == own id` or `$all`        | `message`             |
//! | anything else, server                  | `message.promiscuous` |
//! | anything else, client                  | none                  |
//!
//! ## Fan-out (server)
//!
//! The sticky store is updated before any fan-out, so a peer handshaking
//! right after always replays the newest value.
//!
//! - `$all` → transport broadcast to every connection, the sender included.
//!   Senders drop their own echo by the self-echo rule above.
//! - registered peer → directed send to its connection
//! - unknown peer → dropped

use shared_bus::Notification;
use shared_types::{ConnectionId, Envelope, Payload, PeerId, RawEnvelope};
use tracing::{debug, warn};

use super::peer_registry::PeerRegistry;
use super::sticky_store::StickyStore;

/// Which side of the hub a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// How an accepted envelope is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A peer registering its identifier (server only).
    Handshake,
    /// The node's own message coming back to it.
    SelfEcho,
    /// Addressed to this node, directly or by broadcast.
    Addressed,
    /// Addressed to some other peer.
    Overheard,
}

/// Classify a validated envelope from the point of view of `own_id`.
#[must_use]
pub fn classify(own_id: &PeerId, role: Role, envelope: &Envelope) -> Classification {
    if role == Role::Server && envelope.is_handshake() {
        Classification::Handshake
    } else if envelope.sender == *own_id {
        Classification::SelfEcho
    } else if envelope.recipient == *own_id || envelope.is_broadcast() {
        Classification::Addressed
    } else {
        Classification::Overheard
    }
}

/// Something the node must do as a result of routing.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteAction {
    /// Raise a local notification.
    Notify(Notification),
    /// Send to one server-side connection.
    Unicast {
        connection: ConnectionId,
        envelope: Envelope,
    },
    /// Send to every server-side connection.
    Broadcast(Envelope),
    /// Send to the server over the client's single connection.
    Upstream(Envelope),
}

/// Validate a raw envelope, logging and discarding malformed ones.
fn validate(raw: RawEnvelope) -> Option<Envelope> {
    match Envelope::try_from(raw) {
        Ok(envelope) => Some(envelope),
        Err(error) => {
            debug!(%error, "Dropping malformed envelope");
            None
        }
    }
}

fn build_envelope(
    sender: &PeerId,
    recipient: PeerId,
    message: Payload,
    topic: Option<String>,
    sticky: bool,
) -> Envelope {
    Envelope {
        topic,
        message,
        sender: sender.clone(),
        recipient,
        sticky,
    }
}

fn message_notification(envelope: Envelope) -> Notification {
    Notification::message(envelope.topic, envelope.message, envelope.sender)
}

// =============================================================================
// SERVER ROUTER
// =============================================================================

/// Routing state of the server: its registry and its sticky store.
#[derive(Debug, Clone)]
pub struct ServerRouter {
    id: PeerId,
    registry: PeerRegistry,
    sticky: StickyStore,
}

impl ServerRouter {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            registry: PeerRegistry::new(),
            sticky: StickyStore::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    #[must_use]
    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    #[must_use]
    pub fn sticky(&self) -> &StickyStore {
        &self.sticky
    }

    /// A connection was accepted; it is not a peer until it handshakes.
    pub fn on_accept(&mut self, connection: ConnectionId) -> Vec<RouteAction> {
        self.registry.track_pending(connection);
        debug!(%connection, pending = self.registry.pending_count(), "Connection accepted");
        vec![RouteAction::Notify(Notification::ClientConnectRaw)]
    }

    /// An envelope arrived on `connection`.
    pub fn on_envelope(&mut self, raw: RawEnvelope, connection: ConnectionId) -> Vec<RouteAction> {
        let Some(envelope) = validate(raw) else {
            return Vec::new();
        };

        match classify(&self.id, Role::Server, &envelope) {
            Classification::Handshake => self.handshake(envelope.sender, connection),
            classification => self.route_application(envelope, classification),
        }
    }

    /// A connection closed.
    pub fn on_disconnect(&mut self, connection: ConnectionId) -> Vec<RouteAction> {
        let peer = self.registry.unregister(connection);
        match &peer {
            Some(peer) => debug!(%peer, %connection, "Peer disconnected"),
            None => warn!(%connection, "Disconnect from a connection with no registered peer"),
        }
        vec![RouteAction::Notify(Notification::ClientDisconnect { peer })]
    }

    /// The server application emits a message.
    pub fn emit_to(
        &mut self,
        recipient: PeerId,
        message: Payload,
        topic: Option<String>,
        sticky: bool,
    ) -> Vec<RouteAction> {
        let envelope = build_envelope(&self.id, recipient, message, topic, sticky);
        self.apply_sticky(&envelope);

        if envelope.recipient == self.id {
            return vec![RouteAction::Notify(message_notification(envelope))];
        }

        self.fan_out(envelope).into_iter().collect()
    }

    fn handshake(&mut self, peer: PeerId, connection: ConnectionId) -> Vec<RouteAction> {
        if peer.is_broadcast() || peer == self.id {
            warn!(%peer, %connection, "Rejecting handshake with a reserved identifier");
            return Vec::new();
        }

        let registration = self.registry.register(peer.clone(), connection);
        if let Some(previous) = registration.replaced_connection {
            debug!(%peer, %previous, %connection, "Peer re-handshaked on a new connection");
        }

        let mut actions = Vec::with_capacity(self.sticky.len() + 1);
        actions.push(RouteAction::Notify(Notification::ClientConnect { peer: peer.clone() }));

        for (topic, message) in self.sticky.snapshot_in_order() {
            let replay = build_envelope(&self.id, peer.clone(), Payload::Value(message), Some(topic), false);
            actions.push(RouteAction::Unicast {
                connection,
                envelope: replay,
            });
        }

        debug!(
            %peer,
            %connection,
            fresh = registration.is_fresh(),
            replayed = actions.len() - 1,
            "Handshake complete"
        );
        actions
    }

    fn route_application(&mut self, envelope: Envelope, classification: Classification) -> Vec<RouteAction> {
        self.apply_sticky(&envelope);

        let mut actions = Vec::with_capacity(2);
        match classification {
            Classification::Addressed => {
                actions.push(RouteAction::Notify(message_notification(envelope.clone())));
            }
            Classification::Overheard => {
                actions.push(RouteAction::Notify(Notification::Promiscuous {
                    topic: envelope.topic.clone(),
                    message: envelope.message.clone(),
                    sender: envelope.sender.clone(),
                    recipient: envelope.recipient.clone(),
                }));
            }
            Classification::SelfEcho | Classification::Handshake => {}
        }

        if envelope.recipient != self.id {
            actions.extend(self.fan_out(envelope));
        }
        actions
    }

    fn fan_out(&self, envelope: Envelope) -> Option<RouteAction> {
        if envelope.is_broadcast() {
            return Some(RouteAction::Broadcast(envelope));
        }

        match self.registry.lookup(envelope.recipient.as_str()) {
            Some(connection) => Some(RouteAction::Unicast { connection, envelope }),
            None => {
                debug!(recipient = %envelope.recipient, "Dropping envelope for unknown peer");
                None
            }
        }
    }

    fn apply_sticky(&mut self, envelope: &Envelope) {
        if let Some(topic) = envelope.sticky_topic() {
            self.sticky.apply(topic, &envelope.message);
            debug!(topic, cleared = envelope.message.is_tombstone(), "Sticky topic updated");
        }
    }
}

// =============================================================================
// CLIENT ROUTER
// =============================================================================

/// Routing rules of a client. Clients hold no shared state.
#[derive(Debug, Clone)]
pub struct ClientRouter {
    id: PeerId,
}

impl ClientRouter {
    pub fn new(id: PeerId) -> Self {
        Self { id }
    }

    #[must_use]
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// The transport (re)connected: handshake, then report open.
    #[must_use]
    pub fn on_connect(&self) -> Vec<RouteAction> {
        vec![
            RouteAction::Upstream(Envelope::handshake(self.id.clone())),
            RouteAction::Notify(Notification::Open),
        ]
    }

    #[must_use]
    pub fn on_disconnect(&self) -> Vec<RouteAction> {
        vec![RouteAction::Notify(Notification::Close)]
    }

    /// An envelope arrived from the server.
    #[must_use]
    pub fn on_envelope(&self, raw: RawEnvelope) -> Vec<RouteAction> {
        let Some(envelope) = validate(raw) else {
            return Vec::new();
        };

        match classify(&self.id, Role::Client, &envelope) {
            Classification::Addressed => vec![RouteAction::Notify(message_notification(envelope))],
            Classification::SelfEcho => Vec::new(),
            Classification::Overheard | Classification::Handshake => {
                debug!(recipient = %envelope.recipient, "Ignoring envelope addressed to another peer");
                Vec::new()
            }
        }
    }

    /// The client application emits a message.
    #[must_use]
    pub fn emit_to(
        &self,
        recipient: PeerId,
        message: Payload,
        topic: Option<String>,
        sticky: bool,
    ) -> Vec<RouteAction> {
        let envelope = build_envelope(&self.id, recipient, message, topic, sticky);
        if envelope.recipient == self.id {
            vec![RouteAction::Notify(message_notification(envelope))]
        } else {
            vec![RouteAction::Upstream(envelope)]
        }
    }
}
