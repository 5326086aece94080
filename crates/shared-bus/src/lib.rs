//! # Shared Bus - Local Notification Bus
//!
//! Carries hub events from a node to the application that embeds it.
//! This is an in-process interface, not a network protocol.
//!
//! ## Channels
//!
//! Every notification belongs to exactly one [`Channel`], and every channel has
//! its own payload shape:
//!
//! ```text
//! open                   ()
//! close                  ()
//! message                (topic, message, sender)
//! message.promiscuous    (topic, message, sender, recipient)   server only
//! client.connect         (peer)                                server only
//! client.connect.raw     ()                                    server only
//! client.disconnect      (peer | none)                         server only
//! ```
//!
//! ## Delivery
//!
//! - **Handlers** registered with [`NotificationBus::on`] run synchronously on
//!   the publishing thread, in registration order.
//! - **Subscriptions** from [`NotificationBus::subscribe`] buffer notifications
//!   for async consumers.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{Channel, ChannelError, Notification, NotificationFilter};
pub use publisher::{Handler, HandlerId, NotificationBus, NotificationPublisher};
pub use subscriber::{NotificationStream, Subscription, SubscriptionError};

/// Maximum notifications to buffer per subscription before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Handlers per channel above which a leak warning is logged. Zero disables it.
pub const DEFAULT_MAX_LISTENERS: usize = 10;
