//! Default log sink: node diagnostic lines become `tracing` debug events.

use shared_types::PeerId;
use tracing::debug;

use crate::ports::LogSink;

/// Forwards diagnostic lines to `tracing` with the node id as a field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, node: &PeerId, line: &str) {
        debug!(node = %node, "{line}");
    }
}
