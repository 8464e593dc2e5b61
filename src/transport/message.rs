//! Client-facing events. Every text frame is `{"event": ..., "data": ...}`.

use serde::{Deserialize, Serialize};
use tungstenite::protocol::Message as WsMessage;

use crate::relay::message::Message;

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Raw chat text typed by the user.
    #[serde(rename = "message")]
    Message(String),
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "message")]
    Message(Message),
}

impl ServerEvent {
    pub fn to_frame(&self) -> Result<WsMessage, serde_json::Error> {
        Ok(WsMessage::text(serde_json::to_string(self)?))
    }
}
