//! # Error Types
//!
//! Errors raised while validating envelopes at the routing boundary.

use thiserror::Error;

/// Reasons a raw envelope is rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// No `sender` field.
    #[error("Malformed envelope: missing sender")]
    MissingSender,

    /// No `recipient` field.
    #[error("Malformed envelope: missing recipient")]
    MissingRecipient,

    /// No `message` field on an envelope that is not a sticky tombstone.
    #[error("Malformed envelope: missing message")]
    MissingMessage,
}
