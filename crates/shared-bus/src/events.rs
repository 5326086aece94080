//! # Hub Notifications
//!
//! Defines every notification a node raises to its embedding application.

use shared_types::{Payload, PeerId};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// All notifications a node can raise.
///
/// Each variant carries exactly the arguments of its channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    // =========================================================================
    // LIFECYCLE (both roles)
    // =========================================================================
    /// The server is accepting connections, or the client is connected.
    Open,

    /// The server endpoint was destroyed, or the client lost its connection.
    Close,

    // =========================================================================
    // MESSAGES
    // =========================================================================
    /// A message addressed to this node or to everyone.
    Message {
        /// Sticky/logical topic, if the sender set one.
        topic: Option<String>,
        /// The payload.
        message: Payload,
        /// Originating peer.
        sender: PeerId,
    },

    /// A message observed by the server but addressed to another peer.
    Promiscuous {
        /// Sticky/logical topic, if the sender set one.
        topic: Option<String>,
        /// The payload.
        message: Payload,
        /// Originating peer.
        sender: PeerId,
        /// Addressed peer.
        recipient: PeerId,
    },

    // =========================================================================
    // PEER LIFECYCLE (server only)
    // =========================================================================
    /// A peer completed the handshake.
    ClientConnect {
        /// The identifier the peer registered.
        peer: PeerId,
    },

    /// A connection was accepted but has not handshaken yet.
    ClientConnectRaw,

    /// A connection closed. `None` means the connection was never registered.
    ClientDisconnect {
        /// The identifier the connection was registered under.
        peer: Option<PeerId>,
    },
}

impl Notification {
    /// Get the channel this notification is raised on.
    #[must_use]
    pub fn channel(&self) -> Channel {
        match self {
            Self::Open => Channel::Open,
            Self::Close => Channel::Close,
            Self::Message { .. } => Channel::Message,
            Self::Promiscuous { .. } => Channel::MessagePromiscuous,
            Self::ClientConnect { .. } => Channel::ClientConnect,
            Self::ClientConnectRaw => Channel::ClientConnectRaw,
            Self::ClientDisconnect { .. } => Channel::ClientDisconnect,
        }
    }

    /// Shorthand for a `message` notification.
    pub fn message(topic: Option<String>, message: Payload, sender: PeerId) -> Self {
        Self::Message {
            topic,
            message,
            sender,
        }
    }
}

/// Named notification channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// `open`
    Open,
    /// `close`
    Close,
    /// `message`
    Message,
    /// `message.promiscuous`
    MessagePromiscuous,
    /// `client.connect`
    ClientConnect,
    /// `client.connect.raw`
    ClientConnectRaw,
    /// `client.disconnect`
    ClientDisconnect,
}

impl Channel {
    /// Every channel, in declaration order.
    pub const ALL: [Channel; 7] = [
        Channel::Open,
        Channel::Close,
        Channel::Message,
        Channel::MessagePromiscuous,
        Channel::ClientConnect,
        Channel::ClientConnectRaw,
        Channel::ClientDisconnect,
    ];

    /// The channel's dotted name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Message => "message",
            Self::MessagePromiscuous => "message.promiscuous",
            Self::ClientConnect => "client.connect",
            Self::ClientConnectRaw => "client.connect.raw",
            Self::ClientDisconnect => "client.disconnect",
        }
    }

    /// Whether only a server node ever raises this channel.
    #[must_use]
    pub fn is_server_only(&self) -> bool {
        matches!(
            self,
            Self::MessagePromiscuous
                | Self::ClientConnect
                | Self::ClientConnectRaw
                | Self::ClientDisconnect
        )
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error parsing a channel name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The name matches no channel.
    #[error("Unknown notification channel: {0}")]
    Unknown(String),
}

impl FromStr for Channel {
    type Err = ChannelError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.name() == name)
            .ok_or_else(|| ChannelError::Unknown(name.to_string()))
    }
}

/// Filter for subscribing to specific channels.
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    /// Channels to include. Empty means all channels.
    pub channels: Vec<Channel>,
}

impl NotificationFilter {
    /// Create a filter that accepts all notifications.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific channels.
    #[must_use]
    pub fn channels(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    /// Check if a notification matches this filter.
    #[must_use]
    pub fn matches(&self, notification: &Notification) -> bool {
        self.channels.is_empty() || self.channels.contains(&notification.channel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_channel_mapping() {
        let n = Notification::message(None, Payload::from("x"), PeerId::from("a"));
        assert_eq!(n.channel(), Channel::Message);
        assert_eq!(
            Notification::ClientDisconnect { peer: None }.channel(),
            Channel::ClientDisconnect
        );
    }

    #[test]
    fn test_channel_names_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(channel.name().parse::<Channel>(), Ok(channel));
        }
        assert_eq!(
            "message.promiscious".parse::<Channel>(),
            Err(ChannelError::Unknown("message.promiscious".to_string()))
        );
    }

    #[test]
    fn test_server_only_channels() {
        assert!(!Channel::Open.is_server_only());
        assert!(!Channel::Message.is_server_only());
        assert!(Channel::MessagePromiscuous.is_server_only());
        assert!(Channel::ClientConnectRaw.is_server_only());
    }

    #[test]
    fn test_filter_all() {
        assert!(NotificationFilter::all().matches(&Notification::Open));
    }

    #[test]
    fn test_filter_by_channel() {
        let filter = NotificationFilter::channels(vec![Channel::ClientConnect]);
        assert!(filter.matches(&Notification::ClientConnect {
            peer: PeerId::from("c1")
        }));
        assert!(!filter.matches(&Notification::Open));
    }
}
