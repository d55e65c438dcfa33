//! Message sink used by the report client.
//!
//! The client does not log on its own. Cache hits and retries are reported
//! through a [`LogSink`] supplied by whoever builds the client.

use crate::types::Severity;

pub trait LogSink: Send + Sync {
    fn log(&self, message: &str, severity: Severity);
}

/// Forwards messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => tracing::info!("{message}"),
            Severity::Warning => tracing::warn!("{message}"),
            Severity::Error => tracing::error!("{message}"),
        }
    }
}

/// Discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _message: &str, _severity: Severity) {}
}
