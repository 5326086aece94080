//! # Notification Subscriber
//!
//! Defines the subscription side of the notification bus.

use crate::events::{Notification, NotificationFilter};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was dropped.
    #[error("Notification bus closed")]
    Closed,
}

/// A subscription handle for receiving notifications.
///
/// Dropping it releases its broadcast receiver.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<Notification>,

    /// Filter for this subscription.
    filter: NotificationFilter,
}

impl Subscription {
    /// Create a new subscription.
    pub(crate) fn new(receiver: broadcast::Receiver<Notification>, filter: NotificationFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next notification that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(notification)` - The next matching notification
    /// - `None` - The bus was dropped
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            let notification = match self.receiver.recv().await {
                Ok(n) => n,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some notifications dropped");
                    continue;
                }
            };

            if self.filter.matches(&notification) {
                return Some(notification);
            }
        }
    }

    /// Try to receive the next notification without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(notification))` - A notification was available and matched
    /// - `Ok(None)` - Nothing available (would block)
    /// - `Err(SubscriptionError::Closed)` - The bus was dropped
    pub fn try_recv(&mut self) -> Result<Option<Notification>, SubscriptionError> {
        loop {
            let notification = match self.receiver.try_recv() {
                Ok(n) => n,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&notification) {
                return Ok(Some(notification));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &NotificationFilter {
        &self.filter
    }
}

/// A stream of notifications matching a filter.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct NotificationStream {
    inner: BroadcastStream<Notification>,
    filter: NotificationFilter,
}

impl NotificationStream {
    /// Create a new notification stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        let Subscription { receiver, filter } = subscription;
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
        }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &NotificationFilter {
        &self.filter
    }
}

impl Stream for NotificationStream {
    type Item = Notification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(notification))) => {
                    if self.filter.matches(&notification) {
                        return Poll::Ready(Some(notification));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Stream lagged, some notifications dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
