//! Wire error types.

use thiserror::Error;

/// Errors raised while building wire values
#[derive(Error, Debug)]
pub enum WireError {
    /// Endpoint bridge address is empty
    #[error("bridge address is empty")]
    EmptyBridge,

    /// Endpoint topic is empty
    #[error("topic is empty")]
    EmptyTopic,

    /// JSON encoding failed
    #[error("json encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors raised by [`crate::MessageDecoder`] implementations
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Text is not valid JSON or does not match the expected shape
    #[error("json decode failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Unsupported JSON-RPC version string
    #[error("unsupported jsonrpc version: {0}")]
    Version(String),

    /// Response carries neither or both of `result` and `error`
    #[error("response must carry exactly one of result or error")]
    Shape,
}
