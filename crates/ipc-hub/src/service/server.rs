//! # Server Node
//!
//! Owns the peer registry and the sticky store, accepts client connections
//! through a [`ServerTransport`] and routes every envelope they send.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shared_bus::{Channel, HandlerId, Notification, NotificationFilter, Subscription};
use shared_types::{Payload, PeerId};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dispatch::{dispatch, report_send, NodeContext};
use crate::config::HubConfig;
use crate::domain::{HubError, RouteAction, ServerRouter, ServerState};
use crate::ports::{EventEmitterApi, ServerEvent, ServerEvents, ServerTransport};

/// The hub server.
///
/// Cheap to clone; clones share the same node.
#[derive(Clone)]
pub struct ServerNode {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    context: NodeContext,
    transport: Arc<dyn ServerTransport>,
    core: Mutex<ServerCore>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

/// State mutated only under the core lock.
struct ServerCore {
    state: ServerState,
    router: ServerRouter,
}

impl ServerNode {
    pub fn new(config: HubConfig, transport: Arc<dyn ServerTransport>) -> Self {
        let id = PeerId::server();
        Self {
            inner: Arc::new(ServerInner {
                context: NodeContext::new(id.clone(), config),
                transport,
                core: Mutex::new(ServerCore {
                    state: ServerState::Idle,
                    router: ServerRouter::new(id),
                }),
                driver: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> ServerState {
        self.inner.core.lock().state
    }

    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.inner.context.config
    }

    /// Registered peers, sorted by identifier.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerId> {
        self.inner.core.lock().router.registry().peers()
    }

    /// Retained sticky values in replay order.
    #[must_use]
    pub fn sticky_snapshot(&self) -> Vec<(String, Value)> {
        self.inner.core.lock().router.sticky().snapshot_in_order()
    }

    /// Register a handler for one notification channel.
    pub fn on<F>(&self, channel: Channel, handler: F) -> HandlerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.inner.context.on(channel, handler)
    }
}

impl ServerInner {
    fn handle_event(&self, event: ServerEvent) -> bool {
        let mut core = self.core.lock();
        if core.state != ServerState::Running {
            debug!(?event, state = core.state.as_str(), "Ignoring transport event");
            return !matches!(event, ServerEvent::Destroyed);
        }

        let actions = match event {
            ServerEvent::Connected(connection) => core.router.on_accept(connection),
            ServerEvent::Message(raw, connection) => core.router.on_envelope(raw, connection),
            ServerEvent::Disconnected(connection) => core.router.on_disconnect(connection),
            ServerEvent::Destroyed => {
                warn!("Server endpoint destroyed");
                // Running → Stopped cannot fail.
                let _ = core.state.stop();
                drop(core);
                self.context.publish_all(vec![Notification::Close]);
                return false;
            }
        };

        let notifications = dispatch(actions, |action| self.send(action));
        drop(core);

        self.context.publish_all(notifications);
        true
    }

    fn send(&self, action: RouteAction) {
        match action {
            RouteAction::Unicast { connection, envelope } => {
                report_send(self.transport.send(connection, &envelope), connection);
            }
            RouteAction::Broadcast(envelope) => {
                report_send(self.transport.broadcast(&envelope), &envelope.recipient);
            }
            RouteAction::Upstream(_) | RouteAction::Notify(_) => {
                debug!("Server router produced a client-only action");
            }
        }
    }
}

/// Drain transport events until the endpoint is destroyed or the node is dropped.
async fn drive(node: Weak<ServerInner>, mut events: ServerEvents) {
    while let Some(event) = events.recv().await {
        let Some(node) = node.upgrade() else {
            break;
        };
        if !node.handle_event(event) {
            break;
        }
    }
    debug!("Server driver finished");
}

#[async_trait]
impl EventEmitterApi for ServerNode {
    fn id(&self) -> &PeerId {
        &self.inner.context.id
    }

    async fn start(&self) -> Result<(), HubError> {
        self.inner.core.lock().state.begin_start()?;

        let address = &self.inner.context.config.socket_path;
        let events = match self.inner.transport.listen(address).await {
            Ok(events) => events,
            Err(error) => {
                self.inner.core.lock().state.abort_start();
                warn!(%address, %error, "Server failed to listen");
                return Err(error.into());
            }
        };

        self.inner.core.lock().state.mark_running()?;
        info!(%address, "Server listening");
        self.inner.context.diag(|| format!("listening on {address}"));
        self.inner.context.publish_all(vec![Notification::Open]);

        let handle = tokio::spawn(drive(Arc::downgrade(&self.inner), events));
        *self.inner.driver.lock() = Some(handle);
        Ok(())
    }

    fn stop(&self) -> Result<(), HubError> {
        if !self.inner.core.lock().state.stop()? {
            return Ok(());
        }

        self.inner.transport.close();
        if let Some(handle) = self.inner.driver.lock().take() {
            handle.abort();
        }
        info!("Server stopped");
        self.inner.context.publish_all(vec![Notification::Close]);
        Ok(())
    }

    fn emit_to(
        &self,
        recipient: PeerId,
        message: Payload,
        topic: Option<String>,
        sticky: bool,
    ) -> Result<(), HubError> {
        let mut core = self.inner.core.lock();
        core.state.ensure_running("emit")?;

        let actions = core.router.emit_to(recipient, message, topic, sticky);
        let notifications = dispatch(actions, |action| self.inner.send(action));
        drop(core);

        self.inner.context.publish_all(notifications);
        Ok(())
    }

    fn on(&self, channel: Channel, handler: Box<dyn Fn(&Notification) + Send + Sync>) -> HandlerId {
        self.inner.context.on(channel, handler)
    }

    fn off(&self, channel: Channel, id: HandlerId) -> bool {
        self.inner.context.off(channel, id)
    }

    fn subscribe(&self, filter: NotificationFilter) -> Subscription {
        self.inner.context.subscribe(filter)
    }
}

impl std::fmt::Debug for ServerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerNode")
            .field("context", &self.inner.context)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
