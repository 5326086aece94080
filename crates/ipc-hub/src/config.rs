//! Node configuration, explicit per node and loadable from environment variables.

use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use shared_bus::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_LISTENERS};

use crate::adapters::TracingLogSink;
use crate::ports::LogSink;

/// Default socket path for the Unix transport.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/ipc-hub.sock";

/// Default client reconnect interval.
pub const DEFAULT_RETRY: Duration = Duration::from_millis(1500);

/// Configuration handed to a node at construction.
#[derive(Clone)]
pub struct HubConfig {
    /// Address the server listens on and clients connect to.
    pub socket_path: String,

    /// Client reconnect interval, passed through to the transport.
    pub retry: Duration,

    /// Suppresses node diagnostic lines when true.
    pub silent: bool,

    /// Handlers per channel above which a leak warning is logged (0 = unlimited).
    pub max_listeners: usize,

    /// Notifications buffered per subscription.
    pub channel_capacity: usize,

    /// Receives diagnostic lines when `silent` is false.
    pub log_sink: Arc<dyn LogSink>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            retry: DEFAULT_RETRY,
            silent: true,
            max_listeners: DEFAULT_MAX_LISTENERS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_sink: Arc::new(TracingLogSink),
        }
    }
}

impl fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubConfig")
            .field("socket_path", &self.socket_path)
            .field("retry", &self.retry)
            .field("silent", &self.silent)
            .field("max_listeners", &self.max_listeners)
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}

impl HubConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `HUB_SOCKET_PATH`: Socket path (default: /var/run/ipc-hub.sock)
    /// - `HUB_RETRY_MS`: Client reconnect interval in ms (default: 1500)
    /// - `HUB_SILENT`: Suppress node diagnostics (default: true)
    /// - `HUB_MAX_LISTENERS`: Handler count warning threshold (default: 10)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`HubConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            socket_path: lookup("HUB_SOCKET_PATH").unwrap_or(defaults.socket_path),

            retry: lookup("HUB_RETRY_MS")
                .and_then(|v| v.parse().ok())
                .map_or(defaults.retry, Duration::from_millis),

            silent: lookup("HUB_SILENT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.silent),

            max_listeners: lookup("HUB_MAX_LISTENERS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_listeners),

            ..defaults
        }
    }

    #[must_use]
    pub fn with_socket_path(mut self, socket_path: impl Into<String>) -> Self {
        self.socket_path = socket_path.into();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    #[must_use]
    pub fn with_max_listeners(mut self, max_listeners: usize) -> Self {
        self.max_listeners = max_listeners;
        self
    }

    #[must_use]
    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    #[must_use]
    pub fn with_log_sink(mut self, log_sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = log_sink;
        self
    }
}
