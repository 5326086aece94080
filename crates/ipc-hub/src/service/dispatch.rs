//! Pieces shared by both node roles: the notification bus, the diagnostic
//! sink and the split of router actions into transport work and
//! notifications.

use std::fmt;

use shared_bus::{
    Channel, HandlerId, Notification, NotificationBus, NotificationFilter, NotificationPublisher,
    Subscription,
};
use shared_types::PeerId;
use tracing::warn;

use crate::config::HubConfig;
use crate::domain::RouteAction;
use crate::ports::TransportError;

/// Identity, configuration and notification bus of one node.
pub(crate) struct NodeContext {
    pub(crate) id: PeerId,
    pub(crate) config: HubConfig,
    bus: NotificationBus,
}

impl NodeContext {
    pub(crate) fn new(id: PeerId, config: HubConfig) -> Self {
        let bus = NotificationBus::with_limits(config.channel_capacity, config.max_listeners);
        Self { id, config, bus }
    }

    /// Hand a diagnostic line to the log sink unless the node is silent.
    pub(crate) fn diag(&self, line: impl FnOnce() -> String) {
        if !self.config.silent {
            self.config.log_sink.log(&self.id, &line());
        }
    }

    /// Publish notifications in order. Must be called without the core lock.
    pub(crate) fn publish_all(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            self.diag(|| describe(&notification));
            self.bus.publish(notification);
        }
    }

    pub(crate) fn on<F>(&self, channel: Channel, handler: F) -> HandlerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.bus.on(channel, handler)
    }

    pub(crate) fn off(&self, channel: Channel, id: HandlerId) -> bool {
        self.bus.off(channel, id)
    }

    pub(crate) fn subscribe(&self, filter: NotificationFilter) -> Subscription {
        self.bus.subscribe(filter)
    }
}

impl fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeContext")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("bus", &self.bus)
            .finish()
    }
}

/// Run every transport action through `send` and return the notifications,
/// both in router order.
pub(crate) fn dispatch(
    actions: Vec<RouteAction>,
    mut send: impl FnMut(RouteAction),
) -> Vec<Notification> {
    let mut notifications = Vec::new();
    for action in actions {
        match action {
            RouteAction::Notify(notification) => notifications.push(notification),
            transport => send(transport),
        }
    }
    notifications
}

/// Sends are best effort: a failure is logged and routing continues.
pub(crate) fn report_send(result: Result<(), TransportError>, target: impl fmt::Display) {
    if let Err(error) = result {
        warn!(%target, %error, "Transport send failed");
    }
}

fn describe(notification: &Notification) -> String {
    match notification {
        Notification::Message { topic, sender, .. } => {
            format!("message from {sender} on {}", topic.as_deref().unwrap_or("-"))
        }
        Notification::Promiscuous {
            topic,
            sender,
            recipient,
            ..
        } => format!(
            "overheard {sender} -> {recipient} on {}",
            topic.as_deref().unwrap_or("-")
        ),
        Notification::ClientConnect { peer } => format!("client {peer} connected"),
        Notification::ClientDisconnect { peer: Some(peer) } => format!("client {peer} disconnected"),
        Notification::ClientDisconnect { peer: None } => "unregistered connection closed".to_string(),
        other => other.channel().to_string(),
    }
}
