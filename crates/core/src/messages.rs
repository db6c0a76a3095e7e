//! Push message schema shared by the WebSocket fan-out and its clients.
//!
//! Wire format: `{"type": "PING" | "PONG" | "UPDATE", "data": <Document> | null}`.

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Discriminator of a [`PushMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Ping,
    Pong,
    Update,
}

/// A message exchanged with a live subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub data: Option<Document>,
}

impl PushMessage {
    pub fn ping() -> Self {
        Self {
            kind: MessageType::Ping,
            data: None,
        }
    }

    pub fn pong() -> Self {
        Self {
            kind: MessageType::Pong,
            data: None,
        }
    }

    /// An `UPDATE` carrying the refreshed document.
    pub fn update(document: Document) -> Self {
        Self {
            kind: MessageType::Update,
            data: Some(document),
        }
    }
}
