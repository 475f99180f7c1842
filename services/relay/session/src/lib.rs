//! Connection lifecycle, heartbeat, host suspension and ordered event dispatch
//! for relay bridges.
//!
//! This crate manages one logical real-time connection to a relay bridge
//! endpoint. The socket itself is a pluggable [`SocketTransport`]; this layer
//! keeps it alive with pings, funnels its events through a single ordered
//! dispatcher task, and reacts to host suspension so callbacks stay correct
//! while the process is backgrounded.
//!
//! ## Features
//!
//! - **Ordered dispatch**: one FIFO, non-reentrant task per connection
//! - **Heartbeat**: zero-length pings on a dedicated timer task while connected
//! - **Lifecycle**: "always active" and host-driven suspension providers
//! - **Diagnostics**: outgoing frames described through pluggable decoders
//! - **WebSocket**: `tokio-tungstenite` transport (feature `websocket`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use relay_session::{
//!     ConnectionHandler, RelayConnection, TracingLogger, TransportError, WebSocketTransport,
//! };
//! use relay_wire::{CloseCode, Endpoint};
//!
//! struct Printer;
//!
//! impl ConnectionHandler for Printer {
//!     fn on_connect(&self) {
//!         println!("connected");
//!     }
//!     fn on_disconnect(&self, error: Option<&TransportError>) {
//!         println!("disconnected: {:?}", error);
//!     }
//!     fn on_text_receive(&self, text: &str) {
//!         println!("<== {}", text);
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = Endpoint::new("wss://bridge.example.org", "b1f2")?;
//! let transport = Arc::new(WebSocketTransport::for_endpoint(&endpoint)?);
//!
//! let connection = RelayConnection::builder(endpoint.clone(), transport)
//!     .handler(Arc::new(Printer))
//!     .logger(Arc::new(TracingLogger::for_endpoint(&endpoint)))
//!     .build()?;
//!
//! connection.open();
//! // ... later
//! connection.send(r#"{"topic":"b1f2","type":"sub","payload":"","silent":true}"#);
//! connection.close(CloseCode::NORMAL);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
mod dispatcher;
pub mod error;
pub mod handler;
pub mod heartbeat;
pub mod lifecycle;
pub mod logger;
pub mod transport;
#[cfg(feature = "websocket")]
pub mod websocket;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Re-export main types
pub use connection::{ConnectionBuilder, ConnectionConfig, RelayConnection, DEFAULT_HEARTBEAT_INTERVAL};
pub use error::{SessionError, TransportError};
pub use handler::{ConnectionHandler, NoopHandler};
pub use heartbeat::Heartbeat;
pub use lifecycle::{
    AlwaysActive, HostLifecycle, LifecycleCallback, LifecycleProvider, LifecycleSignal, Subscription,
};
pub use logger::{DiagnosticLogger, NoopLogger, TracingLogger};
pub use transport::{SocketTransport, TransportEvent, TransportEventSink};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
