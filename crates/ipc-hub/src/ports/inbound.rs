//! # Driving Ports (Inbound API)
//!
//! The event-emitter surface both node roles expose to the application.

use async_trait::async_trait;
use shared_bus::{
    Channel, HandlerId, Notification, NotificationFilter, NotificationStream, Subscription,
};
use shared_types::{Payload, PeerId};

use crate::domain::HubError;

/// Primary API for interacting with a hub node.
///
/// # Example
///
/// ```rust,ignore
/// use ipc_hub::ports::EventEmitterApi;
///
/// async fn announce<N: EventEmitterApi>(node: &N) -> Result<(), HubError> {
///     node.start().await?;
///     node.emit("ready".into(), Some("status".into()), true)?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait EventEmitterApi: Send + Sync {
    /// The node's own identifier.
    fn id(&self) -> &PeerId;

    /// Start the transport. Resolves once the server is accepting or the
    /// client is connected.
    ///
    /// # Errors
    ///
    /// - `HubError::InvalidState` if the node was already started
    /// - `HubError::ReservedId` if a client was created as `server` or `$all`
    /// - `HubError::Transport` if the transport failed; the node may be
    ///   started again
    async fn start(&self) -> Result<(), HubError>;

    /// Stop the node. Terminal; stopping twice is a no-op.
    fn stop(&self) -> Result<(), HubError>;

    /// Broadcast a message to every peer.
    fn emit(&self, message: Payload, topic: Option<String>, sticky: bool) -> Result<(), HubError> {
        self.emit_to(PeerId::broadcast(), message, topic, sticky)
    }

    /// Send a message to one peer, to `$all`, or to this node itself.
    ///
    /// Delivery is best effort: sending to an unknown peer is not an error.
    fn emit_to(
        &self,
        recipient: PeerId,
        message: Payload,
        topic: Option<String>,
        sticky: bool,
    ) -> Result<(), HubError>;

    /// Register a handler for one notification channel.
    fn on(&self, channel: Channel, handler: Box<dyn Fn(&Notification) + Send + Sync>) -> HandlerId;

    /// Remove a handler. Returns `false` if it was not registered.
    fn off(&self, channel: Channel, id: HandlerId) -> bool;

    /// Buffer notifications matching `filter` for async consumption.
    fn subscribe(&self, filter: NotificationFilter) -> Subscription;

    /// Like [`subscribe`](Self::subscribe), as a `Stream`.
    fn stream(&self, filter: NotificationFilter) -> NotificationStream {
        NotificationStream::new(self.subscribe(filter))
    }
}
