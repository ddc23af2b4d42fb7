//! # SubPub
//!
//! `subpub` is an in-process publish/subscribe broker with a small WebSocket
//! front end.
//!
//! Publishers push messages under a string topic; every subscription on that
//! topic gets its own bounded mailbox and delivery worker, so a slow consumer
//! never slows the publisher or other consumers. When a mailbox is full the
//! message is dropped for that subscriber only.
//!
//! ## Core Modules
//!
//! - `broker`: topic registry, subscriptions, delivery workers and shutdown.
//! - `service`: request validation and status mapping on top of the broker.
//! - `transport`: the WebSocket server and its JSON protocol.
//! - `client`: a WebSocket client and the CLI client modes.
//! - `config`: loading server and logging configuration.
//! - `utils`: shared error types, logging and signal helpers.

pub mod broker;
pub mod client;
pub mod config;
pub mod service;
pub mod transport;
pub mod utils;

pub use broker::{Broker, Subscription};
pub use utils::error::BrokerError;
