//! WebSocket transport
//!
//! A minimal WebSocket server that translates protocol JSON frames into
//! service calls. Responsibilities:
//! - Accept TCP/WebSocket connections until the shutdown future resolves
//! - Decode `ClientMessage` frames and reply with `ServerMessage` frames
//! - Forward events delivered by the broker to the connection's writer
//! - Unsubscribe everything a connection holds once the peer goes away

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, Sender};
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Subscription;
use crate::service::{Code, Message, PubSubService, Status};
use crate::transport::message::{ClientMessage, ServerMessage};

/// Frames queued for a connection's writer before senders have to wait.
///
/// Event forwarding waits on this queue, so a peer that reads slowly backs up
/// into its subscription mailboxes rather than into server memory.
pub(crate) const OUTBOUND_CAPACITY: usize = 64;

/// Binds `addr` and serves connections until `shutdown` resolves.
pub async fn start_websocket_server<S>(
    addr: &str,
    service: PubSubService,
    shutdown: S,
) -> std::io::Result<()>
where
    S: Future<Output = ()>,
{
    let listener = TcpListener::bind(addr).await?;
    serve(listener, service, shutdown).await
}

/// Serves connections accepted on `listener` until `shutdown` resolves.
///
/// Connections already accepted keep running after this returns; closing the
/// service's broker is up to the caller.
pub async fn serve<S>(listener: TcpListener, service: PubSubService, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()>,
{
    let addr = listener.local_addr()?;
    info!("WebSocket server listening on ws://{addr}");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("WebSocket server no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(stream, peer, service.clone()));
                }
                Err(e) => warn!("Failed to accept connection: {e}"),
            },
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, service: PubSubService) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, "WebSocket handshake error: {e}");
            return;
        }
    };

    let client_id = format!("client-{}", uuid::Uuid::new_v4());
    info!(client = %client_id, %peer, "client connected");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CAPACITY);

    // broker → client
    let writer = {
        let client_id = client_id.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let text = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {e}");
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(WsMessage::text(text)).await {
                    warn!(client = %client_id, "Failed to send message: {e}");
                    break;
                }
            }
            debug!(client = %client_id, "send loop closed");
        })
    };

    let mut connection = Connection::new(client_id.clone(), service, tx);

    // client → broker
    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(msg) if msg.is_close() => break,
            Ok(msg) if msg.is_text() => {
                if let Ok(text) = msg.to_text() {
                    connection.handle_frame(text).await;
                }
            }
            // ping/pong are answered by tungstenite; binary frames are not part of the protocol
            Ok(_) => {}
            Err(e) => {
                warn!(client = %client_id, "WebSocket read error: {e}");
                break;
            }
        }
    }

    connection.close();
    writer.abort();
    info!(client = %client_id, "client disconnected");
}

/// Per-connection state: the reply channel and the subscriptions held.
pub(crate) struct Connection {
    id: String,
    service: PubSubService,
    tx: Sender<ServerMessage>,
    subscriptions: HashMap<String, Subscription<Message>>,
}

impl Connection {
    pub(crate) fn new(id: String, service: PubSubService, tx: Sender<ServerMessage>) -> Self {
        Self {
            id,
            service,
            tx,
            subscriptions: HashMap::new(),
        }
    }

    /// Decodes one text frame, runs it and queues the reply.
    pub(crate) async fn handle_frame(&mut self, text: &str) {
        let reply = match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Subscribe { key }) => self.subscribe(key),
            Ok(ClientMessage::Unsubscribe { key }) => self.unsubscribe(key),
            Ok(ClientMessage::Publish { key, data }) => self
                .service
                .publish(&key, &data)
                .map(|()| ServerMessage::Published { key }),
            Err(err) => {
                warn!(client = %self.id, "Invalid client message: {err} | {text}");
                Err(Status::new(Code::BadRequest, err.to_string()))
            }
        };

        let reply = reply.unwrap_or_else(ServerMessage::from);
        if self.tx.send(reply).await.is_err() {
            debug!(client = %self.id, "reply dropped, writer gone");
        }
    }

    fn subscribe(&mut self, key: String) -> Result<ServerMessage, Status> {
        if !self.subscriptions.contains_key(&key) {
            let sub = self.service.subscribe(&key, self.tx.clone())?;
            info!(client = %self.id, key = %key, "client subscribed");
            self.subscriptions.insert(key.clone(), sub);
        }
        Ok(ServerMessage::Subscribed { key })
    }

    fn unsubscribe(&mut self, key: String) -> Result<ServerMessage, Status> {
        if key.is_empty() {
            return Err(Status::invalid_argument("key is empty"));
        }
        match self.subscriptions.remove(&key) {
            Some(sub) => {
                sub.unsubscribe();
                info!(client = %self.id, key = %key, "client unsubscribed");
                Ok(ServerMessage::Unsubscribed { key })
            }
            None => Err(Status::new(Code::NotFound, format!("not subscribed to {key}"))),
        }
    }

    /// Unsubscribes everything this connection holds.
    pub(crate) fn close(&mut self) {
        for (key, sub) in self.subscriptions.drain() {
            sub.unsubscribe();
            debug!(client = %self.id, key = %key, "subscription released");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
