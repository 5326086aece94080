//! Domain Errors for the Hub

use crate::ports::TransportError;
use shared_types::PeerId;
use thiserror::Error;

/// Errors surfaced to callers of node operations.
///
/// Routing itself never fails: anomalies met while handling transport
/// events are logged or turned into notifications instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// The operation is not allowed in the node's current lifecycle state.
    #[error("Cannot {operation} while node is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the node was in.
        state: &'static str,
    },

    /// A client was given `server` or `$all` as its own identifier.
    #[error("Reserved peer identifier: {0}")]
    ReservedId(PeerId),

    /// The transport failed to start.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
