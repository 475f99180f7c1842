//! JSON-RPC message shapes and the bridge's pub/sub envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WireError;

/// JSON-RPC version string accepted by the decoders
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Request ID
    pub id: u64,
    /// Protocol version
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i64,
    /// Human readable message
    pub message: String,
}

/// JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// ID of the request being answered
    pub id: u64,
    /// Protocol version
    pub jsonrpc: String,
    /// Successful result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// Envelope type understood by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMessageKind {
    /// Publish a payload to a topic
    Pub,
    /// Subscribe to a topic
    Sub,
    /// Acknowledge a delivered payload
    Ack,
}

/// Pub/sub envelope sent to the bridge over text frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    /// Target topic
    pub topic: String,
    /// Envelope type
    #[serde(rename = "type")]
    pub kind: RelayMessageKind,
    /// Opaque payload
    pub payload: String,
    /// Suppress push notifications for this payload
    #[serde(default)]
    pub silent: bool,
}

impl RelayMessage {
    /// Subscription envelope for `topic`
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            kind: RelayMessageKind::Sub,
            payload: String::new(),
            silent: true,
        }
    }

    /// Publish envelope carrying `payload`
    pub fn publish(topic: impl Into<String>, payload: impl Into<String>, silent: bool) -> Self {
        Self {
            topic: topic.into(),
            kind: RelayMessageKind::Pub,
            payload: payload.into(),
            silent,
        }
    }

    /// Encode as a single text frame
    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_envelope_json() {
        let text = RelayMessage::subscribe("abc").to_json().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"topic": "abc", "type": "sub", "payload": "", "silent": true})
        );
    }

    #[test]
    fn test_envelope_silent_defaults_to_false() {
        let message: RelayMessage =
            serde_json::from_str(r#"{"topic":"t","type":"pub","payload":"x"}"#).unwrap();
        assert_eq!(message.kind, RelayMessageKind::Pub);
        assert!(!message.silent);
    }

    #[test]
    fn test_response_omits_absent_fields() {
        let response = JsonRpcResponse {
            id: 3,
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(json!(true)),
            error: None,
        };
        let text = serde_json::to_string(&response).unwrap();
        assert!(!text.contains("error"));
    }
}
