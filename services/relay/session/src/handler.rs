//! User callbacks for connection events.

use crate::error::TransportError;

/// Receives logical connection events.
///
/// Every method defaults to a no-op, so implementors override only what they
/// need. Callbacks run on the connection's dispatcher task, in the order the
/// transport produced the underlying events, and never after the connection
/// has been torn down. `on_connect` and `on_disconnect` alternate.
pub trait ConnectionHandler: Send + Sync {
    /// Socket became connected
    fn on_connect(&self) {}

    /// Socket disconnected while the host was active.
    ///
    /// `error` is set when the disconnect was caused by a transport failure.
    fn on_disconnect(&self, error: Option<&TransportError>) {
        let _ = error;
    }

    /// Text frame received
    fn on_text_receive(&self, text: &str) {
        let _ = text;
    }
}

/// Handler that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl ConnectionHandler for NoopHandler {}
