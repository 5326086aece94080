//! # Wire Envelope
//!
//! The unit of communication between the hub server and its clients.
//!
//! ## Two Shapes
//!
//! - [`RawEnvelope`]: exactly what a transport decoded. Every field is optional.
//! - [`Envelope`]: a validated envelope. `sender` and `recipient` are present and
//!   `message` is either a value or the sticky tombstone.
//!
//! ## Tombstones
//!
//! An absent `message` is the reserved tombstone marker. It is only meaningful
//! on a sticky write (`sticky == true` with a `topic`), where it clears the
//! retained value. Anywhere else an absent message makes the envelope
//! malformed. JSON `null` is treated the same as an absent field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::PeerId;
use crate::errors::EnvelopeError;
use crate::HANDSHAKE;

/// An envelope as decoded from the wire, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticky: Option<bool>,
}

/// Message carried by an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Any serializable application value.
    Value(Value),
    /// Clears a sticky topic. Never stored.
    Tombstone,
}

impl Payload {
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone)
    }

    /// Whether this payload is the literal handshake token.
    #[must_use]
    pub fn is_handshake(&self) -> bool {
        matches!(self, Self::Value(Value::String(s)) if s == HANDSHAKE)
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Tombstone => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Tombstone => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Tombstone,
            value => Self::Value(value),
        }
    }
}

impl From<Option<Value>> for Payload {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::Tombstone, Self::from)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

/// A validated envelope.
///
/// Serializes through [`RawEnvelope`], so decoding a malformed envelope fails
/// with an [`EnvelopeError`] message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub struct Envelope {
    pub topic: Option<String>,
    pub message: Payload,
    pub sender: PeerId,
    pub recipient: PeerId,
    pub sticky: bool,
}

impl Envelope {
    /// Create a non-sticky envelope without a topic.
    pub fn new(sender: impl Into<PeerId>, recipient: impl Into<PeerId>, message: impl Into<Payload>) -> Self {
        Self {
            topic: None,
            message: message.into(),
            sender: sender.into(),
            recipient: recipient.into(),
            sticky: false,
        }
    }

    /// The handshake a client sends to register `sender` with the server.
    pub fn handshake(sender: impl Into<PeerId>) -> Self {
        Self::new(sender, PeerId::server(), HANDSHAKE)
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn with_sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }

    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.recipient.is_broadcast()
    }

    #[must_use]
    pub fn is_handshake(&self) -> bool {
        self.message.is_handshake()
    }

    /// The topic this envelope writes to the sticky store, if any.
    ///
    /// Only sticky envelopes with a topic perform a write.
    #[must_use]
    pub fn sticky_topic(&self) -> Option<&str> {
        if self.sticky {
            self.topic.as_deref()
        } else {
            None
        }
    }
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = EnvelopeError;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        let sender = raw.sender.ok_or(EnvelopeError::MissingSender)?;
        let recipient = raw.recipient.ok_or(EnvelopeError::MissingRecipient)?;
        let sticky = raw.sticky.unwrap_or(false);

        let message = match raw.message {
            Some(Value::Null) | None if sticky && raw.topic.is_some() => Payload::Tombstone,
            Some(Value::Null) | None => return Err(EnvelopeError::MissingMessage),
            Some(value) => Payload::Value(value),
        };

        Ok(Self {
            topic: raw.topic,
            message,
            sender: PeerId::from(sender),
            recipient: PeerId::from(recipient),
            sticky,
        })
    }
}

impl From<Envelope> for RawEnvelope {
    fn from(envelope: Envelope) -> Self {
        Self {
            topic: envelope.topic,
            message: envelope.message.into_value(),
            sender: Some(envelope.sender.into_inner()),
            recipient: Some(envelope.recipient.into_inner()),
            sticky: envelope.sticky.then_some(true),
        }
    }
}
