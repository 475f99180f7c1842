//! Session error types.

use thiserror::Error;

/// Errors reported by a socket transport.
///
/// Carried inside [`crate::TransportEvent::Error`] and handed to
/// [`crate::ConnectionHandler::on_disconnect`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection or handshake could not be established
    #[error("connect failed: {0}")]
    Connect(String),

    /// Established socket failed
    #[error("socket error: {0}")]
    Socket(String),

    /// Peer violated the framing protocol
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Endpoint address is not usable by this transport
    #[error("invalid address: {0}")]
    Address(String),

    /// No Tokio runtime to run the socket on
    #[error("no tokio runtime available: {0}")]
    Runtime(String),
}

/// Errors raised while building a connection
#[derive(Error, Debug)]
pub enum SessionError {
    /// Connection must be built inside a Tokio runtime
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}
