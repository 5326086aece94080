//! # Client Node
//!
//! Connects to the server through a [`ClientTransport`], registers its
//! identifier with the handshake and delivers what the server routes to it.
//!
//! Reconnecting is the transport's job; the node only follows the
//! `Connected`/`Disconnected` events and handshakes again after each
//! reconnection.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_bus::{Channel, HandlerId, Notification, NotificationFilter, Subscription};
use shared_types::{Payload, PeerId};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dispatch::{dispatch, report_send, NodeContext};
use crate::config::HubConfig;
use crate::domain::{ClientRouter, ClientState, HubError, RouteAction};
use crate::ports::{ClientEvent, ClientEvents, ClientTransport, EventEmitterApi, TransportError};

/// A hub client.
///
/// Cheap to clone; clones share the same node.
#[derive(Clone)]
pub struct ClientNode {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    context: NodeContext,
    transport: Arc<dyn ClientTransport>,
    core: Mutex<ClientCore>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

struct ClientCore {
    state: ClientState,
    router: ClientRouter,
}

impl ClientNode {
    /// Create a client with a random identifier.
    pub fn new(config: HubConfig, transport: Arc<dyn ClientTransport>) -> Self {
        Self::with_id(PeerId::random(), config, transport)
    }

    /// Create a client with a caller-chosen identifier.
    pub fn with_id(id: PeerId, config: HubConfig, transport: Arc<dyn ClientTransport>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                context: NodeContext::new(id.clone(), config),
                transport,
                core: Mutex::new(ClientCore {
                    state: ClientState::Idle,
                    router: ClientRouter::new(id),
                }),
                driver: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> ClientState {
        self.inner.core.lock().state
    }

    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.inner.context.config
    }

    /// Register a handler for one notification channel.
    pub fn on<F>(&self, channel: Channel, handler: F) -> HandlerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        note_server_only(&self.inner.context.id, channel);
        self.inner.context.on(channel, handler)
    }
}

/// Clients never raise server-only channels; a handler there never fires.
fn note_server_only(id: &PeerId, channel: Channel) {
    if channel.is_server_only() {
        debug!(%id, %channel, "Client listening on a server-only channel");
    }
}

impl ClientInner {
    /// Returns `false` once the driver should exit.
    fn handle_event(&self, event: ClientEvent) -> bool {
        let mut core = self.core.lock();
        if core.state.is_stopped() {
            return false;
        }

        let (actions, keep_going) = match event {
            ClientEvent::Connected => {
                if !core.state.on_connected() {
                    return true;
                }
                info!(id = %self.context.id, "Client connected");
                (core.router.on_connect(), true)
            }
            ClientEvent::Message(raw) => (core.router.on_envelope(raw), true),
            ClientEvent::Disconnected => {
                if !core.state.on_disconnected() {
                    return true;
                }
                info!(id = %self.context.id, "Client disconnected");
                (core.router.on_disconnect(), true)
            }
            ClientEvent::Destroyed => {
                warn!(id = %self.context.id, "Client transport destroyed");
                if core.state.on_disconnected() {
                    (core.router.on_disconnect(), false)
                } else {
                    (Vec::new(), false)
                }
            }
        };

        let notifications = dispatch(actions, |action| self.send(action));
        drop(core);

        self.context.publish_all(notifications);
        keep_going
    }

    fn send(&self, action: RouteAction) {
        match action {
            RouteAction::Upstream(envelope) => {
                report_send(self.transport.send(&envelope), &envelope.recipient);
            }
            RouteAction::Unicast { .. } | RouteAction::Broadcast(_) | RouteAction::Notify(_) => {
                debug!("Client router produced a server-only action");
            }
        }
    }
}

async fn drive(node: Weak<ClientInner>, mut events: ClientEvents) {
    while let Some(event) = events.recv().await {
        let Some(node) = node.upgrade() else {
            break;
        };
        if !node.handle_event(event) {
            break;
        }
    }
    debug!("Client driver finished");
}

#[async_trait]
impl EventEmitterApi for ClientNode {
    fn id(&self) -> &PeerId {
        &self.inner.context.id
    }

    async fn start(&self) -> Result<(), HubError> {
        let id = &self.inner.context.id;
        if id.is_reserved() {
            warn!(%id, "Refusing to start a client under a reserved identifier");
            return Err(HubError::ReservedId(id.clone()));
        }
        self.inner.core.lock().state.begin_start()?;

        let config = &self.inner.context.config;
        let mut events = match self.inner.transport.connect(&config.socket_path, config.retry).await {
            Ok(events) => events,
            Err(error) => {
                self.inner.core.lock().state.abort_start();
                warn!(address = %config.socket_path, %error, "Client failed to connect");
                return Err(error.into());
            }
        };

        // Resolve only once connected and handshaken.
        match events.recv().await {
            Some(ClientEvent::Connected) => {
                self.inner.handle_event(ClientEvent::Connected);
            }
            other => {
                self.inner.core.lock().state.abort_start();
                self.inner.transport.disconnect();
                warn!(event = ?other, "Client transport closed before connecting");
                return Err(TransportError::Closed.into());
            }
        }
        self.inner
            .context
            .diag(|| format!("connected to {}", config.socket_path));

        let handle = tokio::spawn(drive(Arc::downgrade(&self.inner), events));
        *self.inner.driver.lock() = Some(handle);
        Ok(())
    }

    fn stop(&self) -> Result<(), HubError> {
        if !self.inner.core.lock().state.stop()? {
            return Ok(());
        }

        self.inner.transport.disconnect();
        if let Some(handle) = self.inner.driver.lock().take() {
            handle.abort();
        }
        info!(id = %self.inner.context.id, "Client stopped");
        Ok(())
    }

    fn emit_to(
        &self,
        recipient: PeerId,
        message: Payload,
        topic: Option<String>,
        sticky: bool,
    ) -> Result<(), HubError> {
        let core = self.inner.core.lock();
        core.state.ensure_open("emit")?;

        let actions = core.router.emit_to(recipient, message, topic, sticky);
        let notifications = dispatch(actions, |action| self.inner.send(action));
        drop(core);

        self.inner.context.publish_all(notifications);
        Ok(())
    }

    fn on(&self, channel: Channel, handler: Box<dyn Fn(&Notification) + Send + Sync>) -> HandlerId {
        note_server_only(&self.inner.context.id, channel);
        self.inner.context.on(channel, handler)
    }

    fn off(&self, channel: Channel, id: HandlerId) -> bool {
        self.inner.context.off(channel, id)
    }

    fn subscribe(&self, filter: NotificationFilter) -> Subscription {
        for channel in &filter.channels {
            note_server_only(&self.inner.context.id, *channel);
        }
        self.inner.context.subscribe(filter)
    }
}

impl std::fmt::Debug for ClientNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientNode")
            .field("context", &self.inner.context)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
