//! broker
//!
//! The in-process publish/subscribe core: topic registry, per-subscription
//! delivery workers with bounded mailboxes, and deadline-bounded shutdown.

pub mod engine;
pub mod mailbox;
pub mod subscription;
mod topic;

pub use engine::Broker;
pub use mailbox::MAILBOX_CAPACITY;
pub use subscription::{SubscriberId, Subscription};
