//! The `service` module is the boundary between the network transport and the
//! broker: request validation, status mapping and forwarding of delivered
//! messages to a per-peer sink.

pub mod message;
pub mod pubsub;
pub mod status;

pub use message::Message;
pub use pubsub::PubSubService;
pub use status::{Code, Status};
