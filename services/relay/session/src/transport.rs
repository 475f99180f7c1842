//! Socket transport abstraction.
//!
//! A transport owns the actual socket. It is driven through fire-and-forget
//! calls and reports what happened through a [`TransportEventSink`], which
//! feeds the connection's dispatcher queue.

use bytes::Bytes;
use relay_wire::CloseCode;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Events produced by a socket transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake completed
    Connected,
    /// Socket closed
    Disconnected {
        /// Close code reported by the peer or the transport
        code: CloseCode,
        /// Close reason text
        reason: String,
    },
    /// Socket failed
    Error(TransportError),
    /// Connection attempt was cancelled before completing
    Cancelled,
    /// Text frame received
    Text(String),
    /// Binary frame received
    Binary(Bytes),
    /// Ping received (the transport answers it)
    Ping(Bytes),
    /// Pong received
    Pong(Bytes),
    /// Transport suggests reconnecting over a better path
    ReconnectSuggested(bool),
    /// Network path viability changed
    ViabilityChanged(bool),
}

/// Delegate handed to a transport for reporting events
#[derive(Debug, Clone)]
pub struct TransportEventSink {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportEventSink {
    /// Create a sink together with the receiving end of its queue
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report an event. Returns false once the receiving side is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Socket primitives required by a relay connection.
///
/// All methods must return without blocking; the work they request completes
/// asynchronously and is observable only through the event sink. Duplicate
/// `connect` calls are the transport's concern.
pub trait SocketTransport: Send + Sync + 'static {
    /// Install the sink that receives this transport's events
    fn set_event_sink(&self, sink: TransportEventSink);

    /// Start connecting
    fn connect(&self);

    /// Close the socket with `code`
    fn disconnect(&self, code: CloseCode);

    /// Send one text frame
    fn write_text(&self, text: String);

    /// Send one ping frame
    fn write_ping(&self, payload: Bytes);
}
