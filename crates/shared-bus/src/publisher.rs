//! # Notification Publisher
//!
//! Defines the publishing side of the notification bus and the handler
//! registry behind `on`/`off`.

use crate::events::{Channel, Notification, NotificationFilter};
use crate::subscriber::Subscription;
use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_LISTENERS};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Callback invoked for every notification on the channel it was registered for.
pub type Handler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Token returned by [`NotificationBus::on`], used to remove the handler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Trait for raising notifications.
pub trait NotificationPublisher: Send + Sync {
    /// Raise a notification.
    ///
    /// # Returns
    ///
    /// The number of handlers and subscriptions that received it.
    fn publish(&self, notification: Notification) -> usize;
}

/// In-process notification bus.
///
/// Handlers are called synchronously; subscriptions are fed through
/// `tokio::sync::broadcast`.
pub struct NotificationBus {
    /// Broadcast sender for subscriptions.
    sender: broadcast::Sender<Notification>,

    /// Registered handlers by channel, in registration order.
    handlers: RwLock<HashMap<Channel, Vec<(HandlerId, Handler)>>>,

    /// Source of handler ids.
    next_handler_id: AtomicU64,

    /// Handlers per channel above which a warning is logged (0 = unlimited).
    max_listeners: usize,

    /// Channels that already triggered the listener warning.
    warned: RwLock<HashSet<Channel>>,

    /// Total notifications published.
    notifications_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl NotificationBus {
    /// Create a new bus with default capacity and listener hint.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_LISTENERS)
    }

    /// Create a new bus with the given subscription capacity and listener hint.
    #[must_use]
    pub fn with_limits(capacity: usize, max_listeners: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            handlers: RwLock::new(HashMap::new()),
            next_handler_id: AtomicU64::new(1),
            max_listeners,
            warned: RwLock::new(HashSet::new()),
            notifications_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Register a handler on a channel.
    pub fn on<F>(&self, channel: Channel, handler: F) -> HandlerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed));
        let count = {
            let Ok(mut handlers) = self.handlers.write() else {
                return id;
            };
            let entry = handlers.entry(channel).or_default();
            entry.push((id, Arc::new(handler)));
            entry.len()
        };

        if self.max_listeners > 0 && count > self.max_listeners {
            self.warn_listener_leak(channel, count);
        }

        debug!(channel = %channel, handler = id.0, "Handler registered");
        id
    }

    /// Remove a handler. Returns `false` if it was not registered on `channel`.
    pub fn off(&self, channel: Channel, id: HandlerId) -> bool {
        let Ok(mut handlers) = self.handlers.write() else {
            return false;
        };
        let Some(entry) = handlers.get_mut(&channel) else {
            return false;
        };

        let before = entry.len();
        entry.retain(|(handler_id, _)| *handler_id != id);
        let removed = entry.len() != before;
        if entry.is_empty() {
            handlers.remove(&channel);
        }
        removed
    }

    /// Number of handlers registered on a channel.
    #[must_use]
    pub fn handler_count(&self, channel: Channel) -> usize {
        self.handlers
            .read()
            .map(|handlers| handlers.get(&channel).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Subscribe to notifications matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: NotificationFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        debug!(channels = ?filter.channels, "New subscription created");
        Subscription::new(receiver, filter)
    }

    /// Get the number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the subscription capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the listener warning threshold.
    #[must_use]
    pub fn max_listeners(&self) -> usize {
        self.max_listeners
    }

    /// Total notifications published.
    #[must_use]
    pub fn notifications_published(&self) -> u64 {
        self.notifications_published.load(Ordering::Relaxed)
    }

    fn warn_listener_leak(&self, channel: Channel, count: usize) {
        let Ok(mut warned) = self.warned.write() else {
            return;
        };
        if warned.insert(channel) {
            warn!(
                channel = %channel,
                handlers = count,
                max_listeners = self.max_listeners,
                "Possible handler leak: listener limit exceeded"
            );
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("capacity", &self.capacity)
            .field("max_listeners", &self.max_listeners)
            .field("subscribers", &self.subscriber_count())
            .field("published", &self.notifications_published())
            .finish_non_exhaustive()
    }
}

impl NotificationPublisher for NotificationBus {
    fn publish(&self, notification: Notification) -> usize {
        let channel = notification.channel();
        self.notifications_published.fetch_add(1, Ordering::Relaxed);

        // Snapshot so handlers may call on/off without deadlocking.
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .map(|handlers| {
                handlers
                    .get(&channel)
                    .map(|entry| entry.iter().map(|(_, h)| Arc::clone(h)).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        for handler in &handlers {
            handler(&notification);
        }

        let receivers = self.sender.send(notification).unwrap_or(0);

        debug!(
            channel = %channel,
            handlers = handlers.len(),
            receivers,
            "Notification published"
        );
        handlers.len() + receivers
    }
}
