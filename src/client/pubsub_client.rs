//! WebSocket client for the subpub server.
//!
//! Replies and events share one stream. Events that arrive while a call is
//! waiting for its acknowledgment are buffered and handed out by
//! [`PubSubClient::next_event`] later.

use std::collections::VecDeque;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use tungstenite::protocol::Message as WsMessage;

use crate::service::Status;
use crate::transport::message::{ClientMessage, ServerMessage};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server rejected request: {0}")]
    Rejected(Status),

    #[error("unexpected reply: {0:?}")]
    Unexpected(ServerMessage),

    #[error("connection closed by server")]
    Closed,
}

/// A message delivered on a subscribed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub key: String,
    pub data: String,
    pub published_at: i64,
}

pub struct PubSubClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pending_events: VecDeque<Event>,
}

/// Prepends `ws://` to addresses given without a scheme.
pub fn to_url(addr: &str) -> String {
    if addr.starts_with("ws://") || addr.starts_with("wss://") {
        addr.to_string()
    } else {
        format!("ws://{addr}")
    }
}

impl PubSubClient {
    /// Connects to `addr`, either a bare `host:port` or a `ws://` URL.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(to_url(addr)).await?;
        Ok(Self {
            stream,
            pending_events: VecDeque::new(),
        })
    }

    pub async fn subscribe(&mut self, key: &str) -> Result<(), ClientError> {
        self.send(&ClientMessage::Subscribe { key: key.to_string() })
            .await?;
        match self.reply().await? {
            ServerMessage::Subscribed { .. } => Ok(()),
            other => Err(ClientError::Unexpected(other)),
        }
    }

    pub async fn unsubscribe(&mut self, key: &str) -> Result<(), ClientError> {
        self.send(&ClientMessage::Unsubscribe { key: key.to_string() })
            .await?;
        match self.reply().await? {
            ServerMessage::Unsubscribed { .. } => Ok(()),
            other => Err(ClientError::Unexpected(other)),
        }
    }

    pub async fn publish(&mut self, key: &str, data: &str) -> Result<(), ClientError> {
        self.send(&ClientMessage::Publish {
            key: key.to_string(),
            data: data.to_string(),
        })
        .await?;
        match self.reply().await? {
            ServerMessage::Published { .. } => Ok(()),
            other => Err(ClientError::Unexpected(other)),
        }
    }

    /// Waits for the next event. `Ok(None)` means the server closed the
    /// stream.
    pub async fn next_event(&mut self) -> Result<Option<Event>, ClientError> {
        if let Some(event) = self.pending_events.pop_front() {
            return Ok(Some(event));
        }
        loop {
            match self.recv().await? {
                None => return Ok(None),
                Some(ServerMessage::Event {
                    key,
                    data,
                    published_at,
                }) => {
                    return Ok(Some(Event {
                        key,
                        data,
                        published_at,
                    }));
                }
                Some(ServerMessage::Error { code, message }) => {
                    return Err(ClientError::Rejected(Status::new(code, message)));
                }
                Some(other) => debug!("ignoring {other:?} while waiting for events"),
            }
        }
    }

    /// Sends a close frame to the server.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }

    async fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        let text = serde_json::to_string(msg)?;
        self.stream.send(WsMessage::text(text)).await?;
        Ok(())
    }

    /// Next non-event frame; events seen on the way are buffered.
    async fn reply(&mut self) -> Result<ServerMessage, ClientError> {
        loop {
            match self.recv().await? {
                None => return Err(ClientError::Closed),
                Some(ServerMessage::Event {
                    key,
                    data,
                    published_at,
                }) => self.pending_events.push_back(Event {
                    key,
                    data,
                    published_at,
                }),
                Some(ServerMessage::Error { code, message }) => {
                    return Err(ClientError::Rejected(Status::new(code, message)));
                }
                Some(reply) => return Ok(reply),
            }
        }
    }

    async fn recv(&mut self) -> Result<Option<ServerMessage>, ClientError> {
        while let Some(frame) = self.stream.next().await {
            let frame = frame?;
            if frame.is_close() {
                return Ok(None);
            }
            if frame.is_text() {
                return Ok(Some(serde_json::from_str(frame.to_text()?)?));
            }
        }
        Ok(None)
    }
}
