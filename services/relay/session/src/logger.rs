//! Diagnostic log capability and the outgoing-frame describer.

use std::sync::Arc;

use relay_wire::{Endpoint, MessageDecoder};
use tracing::debug;

/// Sink for human-readable diagnostic lines
pub trait DiagnosticLogger: Send + Sync {
    /// Record one line
    fn log(&self, line: &str);
}

/// Logger that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl DiagnosticLogger for NoopLogger {
    fn log(&self, _line: &str) {}
}

/// Logger that forwards lines to `tracing` at debug level
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    label: Option<String>,
}

impl TracingLogger {
    /// Logger that tags every line with `endpoint`
    pub fn for_endpoint(endpoint: &Endpoint) -> Self {
        Self {
            label: Some(endpoint.to_string()),
        }
    }
}

impl DiagnosticLogger for TracingLogger {
    fn log(&self, line: &str) {
        match &self.label {
            Some(label) => debug!("[{}] {}", label, line),
            None => debug!("{}", line),
        }
    }
}

/// Describes each outgoing text frame with exactly one log line.
///
/// Decoders are tried in order; the first success is logged in structured
/// form, otherwise the raw text is logged.
pub(crate) struct OutgoingLog {
    endpoint: Endpoint,
    decoders: Vec<Arc<dyn MessageDecoder>>,
    logger: Arc<dyn DiagnosticLogger>,
}

impl OutgoingLog {
    pub(crate) fn new(
        endpoint: Endpoint,
        decoders: Vec<Arc<dyn MessageDecoder>>,
        logger: Arc<dyn DiagnosticLogger>,
    ) -> Self {
        Self {
            endpoint,
            decoders,
            logger,
        }
    }

    pub(crate) fn record(&self, text: &str) {
        let line = self
            .decoders
            .iter()
            .find_map(|decoder| decoder.decode(text, &self.endpoint).ok())
            .map(|decoded| format!("==> {}", decoded))
            .unwrap_or_else(|| format!("==> {}", text));
        self.logger.log(&line);
    }
}
