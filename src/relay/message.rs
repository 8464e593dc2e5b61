//! Chat message model
//!
//! A `Message` is the unit relayed between clients. The server stamps it
//! when the client's text arrives; clients never supply the timestamp.
//! The same JSON object is used as the broker body and as the payload of the
//! outbound `message` event, so decoding on the receive side is the exact
//! inverse of encoding on publish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::error::RelayError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    text: String,
    #[serde(rename = "date")]
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a message from raw client text. Empty and whitespace-only text
    /// is rejected.
    pub fn new(text: impl Into<String>, timestamp: DateTime<Utc>) -> Result<Self, RelayError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(RelayError::EmptyMessage);
        }
        Ok(Self { text, timestamp })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Broker body for this message.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RelayError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a broker body produced by [`Message::to_bytes`].
    ///
    /// Bodies carrying blank text are refused the same way client input is.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, RelayError> {
        let decoded: Self = serde_json::from_slice(payload)?;
        Self::new(decoded.text, decoded.timestamp)
    }
}
