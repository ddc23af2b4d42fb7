//! The `transport` module is responsible for network communication with
//! clients over WebSockets.
//!
//! It defines the JSON protocol spoken between clients and the server and the
//! server loop itself: accepting connections, decoding frames, forwarding
//! them to the [`PubSubService`](crate::service::PubSubService) and pushing
//! delivered events back to the peer.

pub mod message;
pub mod websocket;

#[cfg(test)]
mod tests;
