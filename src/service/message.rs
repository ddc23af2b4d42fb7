use serde::{Deserialize, Serialize};

/// Envelope the service publishes through the broker.
///
/// - `key` - topic the message was published under.
/// - `data` - opaque string payload.
/// - `published_at` - Unix timestamp in milliseconds, stamped by the service
///   when the publish request was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub key: String,
    pub data: String,
    pub published_at: i64,
}

impl Message {
    pub fn new(key: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
            published_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
