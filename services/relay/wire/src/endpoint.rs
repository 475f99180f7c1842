//! Identity of the remote relay conversation.

use std::fmt;

use crate::error::WireError;

/// Bridge address plus conversation topic.
///
/// Created once per connection and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    bridge: String,
    topic: String,
}

impl Endpoint {
    /// Create an endpoint, rejecting empty fields
    pub fn new(bridge: impl Into<String>, topic: impl Into<String>) -> Result<Self, WireError> {
        let bridge = bridge.into();
        let topic = topic.into();

        if bridge.trim().is_empty() {
            return Err(WireError::EmptyBridge);
        }
        if topic.trim().is_empty() {
            return Err(WireError::EmptyTopic);
        }

        Ok(Self { bridge, topic })
    }

    /// Bridge address (usually a `wss://` URL)
    pub fn bridge(&self) -> &str {
        &self.bridge
    }

    /// Conversation topic
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.bridge, self.topic)
    }
}
