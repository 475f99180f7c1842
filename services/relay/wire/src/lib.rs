//! Endpoint identity, close codes, and message shapes for the relay bridge.
//!
//! This crate holds the small, transport-agnostic vocabulary shared by the
//! session layer and the binary: who we talk to ([`Endpoint`]), how a socket
//! is closed ([`CloseCode`]), what the bridge's JSON-RPC traffic looks like
//! ([`JsonRpcRequest`], [`JsonRpcResponse`], [`RelayMessage`]), and the
//! pluggable decoders used to describe outgoing frames in diagnostic logs.
//!
//! ## Example
//!
//! ```rust
//! use relay_wire::{DecodedMessage, Endpoint, JsonRpcRequestDecoder, MessageDecoder};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = Endpoint::new("wss://bridge.example.org", "a1b2c3")?;
//! let decoder = JsonRpcRequestDecoder;
//!
//! let decoded = decoder.decode(r#"{"jsonrpc":"2.0","id":7,"method":"ping","params":[]}"#, &endpoint)?;
//! assert!(matches!(decoded, DecodedMessage::Request(_)));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod close;
pub mod decode;
pub mod endpoint;
pub mod error;
pub mod message;

// Re-export main types
pub use close::CloseCode;
pub use decode::{DecodedMessage, JsonRpcRequestDecoder, JsonRpcResponseDecoder, MessageDecoder};
pub use endpoint::Endpoint;
pub use error::{DecodeError, WireError};
pub use message::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, RelayMessage, RelayMessageKind, JSONRPC_VERSION,
};
