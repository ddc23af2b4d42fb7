//! PubSub service
//!
//! Maps the network-facing operations onto the broker. Keys are validated here
//! (the broker itself accepts any topic string) and broker errors are mapped
//! onto [`Status`] codes. Nothing is retried.

use std::time::Duration;

use tokio::sync::mpsc::Sender;
use tracing::{info, warn};

use crate::broker::{Broker, Subscription};
use crate::service::message::Message;
use crate::service::status::Status;
use crate::utils::error::BrokerError;

#[derive(Debug, Clone)]
pub struct PubSubService {
    broker: Broker<Message>,
}

impl Default for PubSubService {
    fn default() -> Self {
        Self::new(Broker::new())
    }
}

impl PubSubService {
    pub fn new(broker: Broker<Message>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &Broker<Message> {
        &self.broker
    }

    /// Subscribes `sink` to `key`. Every message delivered for the key is
    /// converted into `T` and pushed into the sink.
    ///
    /// The handler waits for room in the sink, so a peer that stops reading
    /// fills this subscription's mailbox and further messages are dropped
    /// there.
    ///
    /// The caller owns the returned subscription and must unsubscribe it when
    /// the remote peer goes away.
    pub fn subscribe<T>(&self, key: &str, sink: Sender<T>) -> Result<Subscription<Message>, Status>
    where
        T: From<Message> + Send + 'static,
    {
        if key.is_empty() {
            return Err(Status::invalid_argument("key is empty"));
        }

        info!(key, "new subscription");

        let handler_key = key.to_string();
        self.broker
            .subscribe(key, move |msg: Message| {
                let sink = sink.clone();
                let key = handler_key.clone();
                async move {
                    if sink.send(T::from(msg)).await.is_err() {
                        warn!(key = %key, "subscriber sink closed, event not forwarded");
                    }
                }
            })
            .map_err(|err| {
                warn!(key, error = err.as_label(), "subscribe failed");
                Status::internal("failed to subscribe")
            })
    }

    /// Publishes `data` under `key`. Succeeds regardless of how many
    /// subscribers actually received it.
    pub fn publish(&self, key: &str, data: &str) -> Result<(), Status> {
        if key.is_empty() {
            return Err(Status::invalid_argument("key is empty"));
        }

        info!(key, "publishing message");

        self.broker
            .publish(key, Message::new(key, data))
            .map_err(|err| {
                warn!(key, error = err.as_label(), "publish failed");
                Status::internal("failed to publish message")
            })
    }

    /// Closes the underlying broker, waiting at most `deadline` for queued
    /// deliveries to finish.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), BrokerError> {
        self.broker.close(deadline).await
    }
}
