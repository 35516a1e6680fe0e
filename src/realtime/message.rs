//! Realtime wire envelopes

use serde::{Deserialize, Serialize};

use crate::client::models::Notification;

/// Server → client envelope, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Notification {
        notification: Notification,
    },
    NotificationRead {
        notification_id: u64,
    },
    #[serde(alias = "unread_count")]
    NotificationCount {
        count: u64,
    },
    Ping,
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Client → server envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Pong,
}

impl ClientMessage {
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}
