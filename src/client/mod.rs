//! The `client` module is the command-line side of subpub: a WebSocket client
//! that can subscribe to a key, publish to it, or both.

pub mod pubsub_client;

use clap::ValueEnum;
use tracing::info;

pub use pubsub_client::{ClientError, Event, PubSubClient};

/// What the CLI client does once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Subscribe and print events until interrupted.
    Sub,
    /// Publish one message and exit.
    Pub,
    /// Subscribe, publish one message, then keep printing events.
    Both,
}

impl Mode {
    pub fn subscribes(self) -> bool {
        matches!(self, Mode::Sub | Mode::Both)
    }

    pub fn publishes(self) -> bool {
        matches!(self, Mode::Pub | Mode::Both)
    }
}

/// Runs the CLI client against the server at `addr`.
pub async fn run(addr: &str, mode: Mode, key: &str, message: &str) -> Result<(), ClientError> {
    let mut client = PubSubClient::connect(addr).await?;

    if mode.subscribes() {
        client.subscribe(key).await?;
        info!("Subscribed to key: {key}");
    }

    if mode.publishes() {
        client.publish(key, message).await?;
        println!("Published message '{message}' to key '{key}'");
    }

    if mode.subscribes() {
        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);
        loop {
            tokio::select! {
                _ = &mut interrupted => break,
                event = client.next_event() => match event? {
                    Some(event) => println!("Received event: {}", event.data),
                    None => {
                        info!("Stream closed by server");
                        return Ok(());
                    }
                },
            }
        }
    }

    client.close().await
}
