pub mod mastodon;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Sender of a bus message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Platform handle, e.g. `alice` or `alice@other.example`
    pub id: String,
    /// Display name of the user
    pub name: String,
}

/// Channel a bus message belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// Body of a bus message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Platform message ID; for replies this is the thread root
    #[serde(default)]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A message exchanged with the bot framework, in either direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub user: User,
    pub room: Room,
    pub message: Content,
    #[serde(default)]
    pub is_reply: bool,
    /// Original platform payload, opaque to the bus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl BusMessage {
    /// Decode a message handed over by the bus as loose JSON
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).context("Failed to decode bus message")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_accepts_minimal_message() {
        let msg = BusMessage::from_value(json!({
            "user": {"id": "alice", "name": "Alice"},
            "room": {"id": "mastodon", "name": "mastodon", "description": "mastodon"},
            "message": {"text": "hello"}
        }))
        .unwrap();
        assert!(!msg.is_reply);
        assert_eq!(msg.message.id, "");
        assert!(msg.message.attachments.is_empty());
        assert!(msg.raw.is_none());
    }

    #[test]
    fn test_from_value_rejects_missing_text() {
        let err = BusMessage::from_value(json!({
            "user": {"id": "alice", "name": "Alice"},
            "room": {"id": "mastodon", "name": "mastodon", "description": "mastodon"},
            "message": {"id": "1"}
        }));
        assert!(err.is_err());
    }
}
