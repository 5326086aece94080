//! # Node Lifecycle
//!
//! State machines for the two node roles.
//!
//! ```text
//! Server:  Idle ──start──→ Listening ──ready──→ Running ──stop──→ Stopped
//!            ↑                 │
//!            └──listen failed──┘
//!
//! Client:  Idle ──start──→ Connecting ──connected──→ Open ⇄ Closed
//!            ↑                 │                      │       │
//!            └─connect failed──┘                      └─stop──┴──→ Stopped
//! ```
//!
//! `Open ⇄ Closed` is driven by the transport reconnecting on its own.

use super::errors::HubError;

/// Server lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    Idle,
    Listening,
    Running,
    Stopped,
}

impl ServerState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }

    /// `Idle → Listening`.
    pub fn begin_start(&mut self) -> Result<(), HubError> {
        self.transition("start", Self::Idle, Self::Listening)
    }

    /// `Listening → Running`.
    pub fn mark_running(&mut self) -> Result<(), HubError> {
        self.transition("finish starting", Self::Listening, Self::Running)
    }

    /// `Listening → Idle`, after the transport refused to listen.
    pub fn abort_start(&mut self) {
        if *self == Self::Listening {
            *self = Self::Idle;
        }
    }

    /// `Running → Stopped`. Stopping twice is a no-op.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn stop(&mut self) -> Result<bool, HubError> {
        match self {
            Self::Running => {
                *self = Self::Stopped;
                Ok(true)
            }
            Self::Stopped => Ok(false),
            _ => Err(self.reject("stop")),
        }
    }

    /// Fail unless the node is routing.
    pub fn ensure_running(&self, operation: &'static str) -> Result<(), HubError> {
        if *self == Self::Running {
            Ok(())
        } else {
            Err(self.reject(operation))
        }
    }

    fn transition(&mut self, operation: &'static str, from: Self, to: Self) -> Result<(), HubError> {
        if *self != from {
            return Err(self.reject(operation));
        }
        *self = to;
        Ok(())
    }

    fn reject(&self, operation: &'static str) -> HubError {
        HubError::InvalidState {
            operation,
            state: self.as_str(),
        }
    }
}

/// Client lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    #[default]
    Idle,
    Connecting,
    Open,
    /// Disconnected; the transport may still reconnect.
    Closed,
    /// Stopped by the application. Terminal.
    Stopped,
}

impl ClientState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Stopped => "stopped",
        }
    }

    /// `Idle → Connecting`.
    pub fn begin_start(&mut self) -> Result<(), HubError> {
        if *self != Self::Idle {
            return Err(self.reject("start"));
        }
        *self = Self::Connecting;
        Ok(())
    }

    /// `Connecting → Idle`, after the transport failed to connect.
    pub fn abort_start(&mut self) {
        if *self == Self::Connecting {
            *self = Self::Idle;
        }
    }

    /// The transport reported a (re)connection. Returns `false` once stopped.
    pub fn on_connected(&mut self) -> bool {
        match self {
            Self::Connecting | Self::Closed | Self::Open => {
                *self = Self::Open;
                true
            }
            Self::Idle | Self::Stopped => false,
        }
    }

    /// The transport reported a disconnection. Returns `false` once stopped.
    pub fn on_disconnected(&mut self) -> bool {
        match self {
            Self::Open | Self::Connecting => {
                *self = Self::Closed;
                true
            }
            Self::Closed | Self::Idle | Self::Stopped => false,
        }
    }

    /// Any state after a successful start → `Stopped`. Stopping twice is a no-op.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn stop(&mut self) -> Result<bool, HubError> {
        match self {
            Self::Open | Self::Closed | Self::Connecting => {
                *self = Self::Stopped;
                Ok(true)
            }
            Self::Stopped => Ok(false),
            Self::Idle => Err(self.reject("stop")),
        }
    }

    /// Fail unless the client is connected.
    pub fn ensure_open(&self, operation: &'static str) -> Result<(), HubError> {
        if *self == Self::Open {
            Ok(())
        } else {
            Err(self.reject(operation))
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self == Self::Stopped
    }

    fn reject(&self, operation: &'static str) -> HubError {
        HubError::InvalidState {
            operation,
            state: self.as_str(),
        }
    }
}
