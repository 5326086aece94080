//! # Hub Runtime
//!
//! Runs a single hub node from environment configuration.
//!
//! ## Environment
//!
//! - `HUB_ROLE`: `server` or `client` (default: server; the first CLI argument wins)
//! - `HUB_CLIENT_ID`: client identifier (default: random)
//! - `HUB_LOG_LEVEL` or `RUST_LOG`: log filter (default: info)
//! - plus every variable read by [`HubConfig::from_env`]
//!
//! ## Console
//!
//! Each line read from stdin is emitted by the node:
//!
//! ```text
//! hello                 broadcast "hello"
//! @c1 hello             send "hello" to peer c1
//! #status {"up":true}   sticky broadcast on topic "status"
//! ```
//!
//! Text that parses as JSON is sent as that value, anything else as a string.

use std::env;
use std::fmt;
use std::str::FromStr;

use ipc_hub::HubConfig;
use serde_json::Value;
use shared_bus::Notification;
use shared_types::{Payload, PeerId};
use thiserror::Error;

/// Which node the runtime runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Server,
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown role '{0}' (expected 'server' or 'client')")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Client => f.write_str("client"),
        }
    }
}

/// Everything the runtime needs to start a node.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub role: Role,
    pub client_id: Option<PeerId>,
    pub log_level: String,
    pub hub: HubConfig,
}

impl RuntimeConfig {
    /// Load from the environment, letting `role_arg` override `HUB_ROLE`.
    pub fn load(role_arg: Option<String>) -> Result<Self, UnknownRole> {
        let role = match role_arg.or_else(|| env::var("HUB_ROLE").ok()) {
            Some(role) => role.parse()?,
            None => Role::default(),
        };

        Ok(Self {
            role,
            client_id: env::var("HUB_CLIENT_ID").ok().map(PeerId::from),
            log_level: env::var("HUB_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            hub: HubConfig::from_env(),
        })
    }
}

/// One console line, decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Broadcast(Payload),
    Direct { recipient: PeerId, message: Payload },
    Sticky { topic: String, message: Payload },
}

/// Decode a console line. Blank lines yield `None`.
#[must_use]
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(rest) = line.strip_prefix('@') {
        let (recipient, text) = rest.split_once(' ').unwrap_or((rest, ""));
        return Some(Command::Direct {
            recipient: PeerId::from(recipient),
            message: payload(text),
        });
    }
    if let Some(rest) = line.strip_prefix('#') {
        let (topic, text) = rest.split_once(' ').unwrap_or((rest, ""));
        return Some(Command::Sticky {
            topic: topic.to_string(),
            message: payload(text),
        });
    }
    Some(Command::Broadcast(payload(line)))
}

/// JSON if it parses, a string otherwise. An empty text is the tombstone.
fn payload(text: &str) -> Payload {
    let text = text.trim();
    if text.is_empty() {
        return Payload::Tombstone;
    }
    serde_json::from_str::<Value>(text).map_or_else(|_| Payload::from(text), Payload::from)
}

/// One-line rendering of a notification for the console log.
#[must_use]
pub fn render(notification: &Notification) -> String {
    fn value(message: &Payload) -> String {
        message
            .as_value()
            .map_or_else(|| "<cleared>".to_string(), Value::to_string)
    }

    match notification {
        Notification::Message { topic, message, sender } => match topic {
            Some(topic) => format!("[{topic}] {sender}: {}", value(message)),
            None => format!("{sender}: {}", value(message)),
        },
        Notification::Promiscuous {
            topic,
            message,
            sender,
            recipient,
        } => format!(
            "{sender} -> {recipient}{}: {}",
            topic.as_ref().map(|t| format!(" [{t}]")).unwrap_or_default(),
            value(message)
        ),
        Notification::ClientConnect { peer } => format!("{peer} joined"),
        Notification::ClientDisconnect { peer } => match peer {
            Some(peer) => format!("{peer} left"),
            None => "unregistered connection left".to_string(),
        },
        other => other.channel().to_string(),
    }
}
