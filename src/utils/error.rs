//! The `error` module defines the error types returned at the broker boundary.
//!
//! There is no delivery-failure variant: a full mailbox drops the message for
//! that subscriber and the publisher never hears about it.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by [`Broker`](crate::broker::Broker) operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Subscribe or publish attempted after `close` has begun.
    #[error("broker is closed")]
    Closed,

    /// `close` gave up waiting for delivery workers; they keep running in the
    /// background until their buffered messages are handled.
    #[error("shutdown deadline {deadline:?} exceeded; {pending} worker(s) still running")]
    DeadlineExceeded {
        /// The deadline passed to `close`.
        deadline: Duration,
        /// Workers that had not finished when the deadline elapsed.
        pending: usize,
    },
}

impl BrokerError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// ```
    /// use subpub::BrokerError;
    ///
    /// assert_eq!(BrokerError::Closed.as_label(), "broker_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::Closed => "broker_closed",
            BrokerError::DeadlineExceeded { .. } => "broker_deadline_exceeded",
        }
    }
}
