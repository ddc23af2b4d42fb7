//! Wire protocol: JSON text frames, internally tagged by `"type"`.

use serde::{Deserialize, Serialize};

use crate::service::{Code, Message, Status};

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { key: String },
    Unsubscribe { key: String },
    Publish { key: String, data: String },
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed { key: String },
    Unsubscribed { key: String },
    /// Empty acknowledgment of a publish.
    Published { key: String },
    Event {
        key: String,
        data: String,
        published_at: i64,
    },
    Error { code: Code, message: String },
}

impl From<Message> for ServerMessage {
    fn from(msg: Message) -> Self {
        ServerMessage::Event {
            key: msg.key,
            data: msg.data,
            published_at: msg.published_at,
        }
    }
}

impl From<Status> for ServerMessage {
    fn from(status: Status) -> Self {
        ServerMessage::Error {
            code: status.code,
            message: status.message,
        }
    }
}
