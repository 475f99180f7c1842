//! Decoders that turn outgoing text frames into structured values.
//!
//! The session layer only uses these to describe frames in diagnostic logs,
//! so a failed decode is never fatal.

use std::fmt;

use tracing::trace;

use crate::endpoint::Endpoint;
use crate::error::DecodeError;
use crate::message::{JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};

/// Successfully decoded frame
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    /// Request-shaped frame
    Request(JsonRpcRequest),
    /// Response-shaped frame
    Response(JsonRpcResponse),
}

impl fmt::Display for DecodedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedMessage::Request(request) => write!(
                f,
                "request {} (id {}) params={}",
                request.method, request.id, request.params
            ),
            DecodedMessage::Response(response) => match (&response.result, &response.error) {
                (Some(result), _) => write!(f, "response (id {}) result={}", response.id, result),
                (None, Some(error)) => write!(
                    f,
                    "response (id {}) error={} {}",
                    response.id, error.code, error.message
                ),
                (None, None) => write!(f, "response (id {})", response.id),
            },
        }
    }
}

/// Capability to decode a text frame sent to `endpoint`
pub trait MessageDecoder: Send + Sync {
    /// Decode `text`, failing if it does not have this decoder's shape
    fn decode(&self, text: &str, endpoint: &Endpoint) -> Result<DecodedMessage, DecodeError>;
}

/// Decodes JSON-RPC requests
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRpcRequestDecoder;

impl MessageDecoder for JsonRpcRequestDecoder {
    fn decode(&self, text: &str, endpoint: &Endpoint) -> Result<DecodedMessage, DecodeError> {
        let request: JsonRpcRequest = serde_json::from_str(text)?;
        check_version(&request.jsonrpc)?;
        trace!("Decoded request {} for {}", request.method, endpoint);
        Ok(DecodedMessage::Request(request))
    }
}

/// Decodes JSON-RPC responses
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRpcResponseDecoder;

impl MessageDecoder for JsonRpcResponseDecoder {
    fn decode(&self, text: &str, endpoint: &Endpoint) -> Result<DecodedMessage, DecodeError> {
        let response: JsonRpcResponse = serde_json::from_str(text)?;
        check_version(&response.jsonrpc)?;
        if response.result.is_some() == response.error.is_some() {
            return Err(DecodeError::Shape);
        }
        trace!("Decoded response {} for {}", response.id, endpoint);
        Ok(DecodedMessage::Response(response))
    }
}

fn check_version(version: &str) -> Result<(), DecodeError> {
    if version == JSONRPC_VERSION {
        Ok(())
    } else {
        Err(DecodeError::Version(version.to_string()))
    }
}
