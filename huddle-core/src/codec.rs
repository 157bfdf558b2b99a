//! Text frame codec for the relay WebSocket.

use crate::error::{Error, Result};
use crate::model::SignalingMessage;

pub fn encode_frame(msg: &SignalingMessage) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::MalformedMessage(e.to_string()))
}

/// Decode one text frame. Unknown `type` tags, missing fields and invalid
/// JSON all map to [`Error::MalformedMessage`].
pub fn decode_frame(text: &str) -> Result<SignalingMessage> {
    serde_json::from_str(text).map_err(|e| {
        let tag = serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_owned));
        match tag {
            Some(tag) => Error::MalformedMessage(format!("type `{tag}`: {e}")),
            None => Error::MalformedMessage(e.to_string()),
        }
    })
}
