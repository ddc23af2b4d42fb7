//! Subscriptions and their delivery workers
//!
//! Every subscription is an active object: a [`Subscriber`] entry in the
//! registry (mailbox producer side plus stop signal) and one tokio task that
//! drains the mailbox and calls the handler, one message at a time.
//!
//! Worker states:
//! - running: waits for the next message or a stop request
//! - draining (stop = [`StopMode::Drain`], sent by `close`): delivers what is
//!   already buffered, in order, then exits
//! - stopped (stop = [`StopMode::Discard`], sent by `unsubscribe`): exits
//!   after the in-flight handler call returns; buffered messages are dropped

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::broker::engine::Shared;
use crate::broker::mailbox::{Inbox, Outbox};

pub type SubscriberId = u64;

/// Stop request delivered to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopMode {
    Running,
    /// Detached by `close`: finish the buffered messages, then exit.
    Drain,
    /// Detached by `unsubscribe`: exit without touching the buffer.
    Discard,
}

/// Registry entry for one subscription.
pub(crate) struct Subscriber<M> {
    pub(crate) id: SubscriberId,
    pub(crate) topic: String,
    outbox: Outbox<M>,
    stop: watch::Sender<StopMode>,
}

impl<M> Subscriber<M> {
    pub(crate) fn new(
        id: SubscriberId,
        topic: String,
        outbox: Outbox<M>,
        stop: watch::Sender<StopMode>,
    ) -> Self {
        Self {
            id,
            topic,
            outbox,
            stop,
        }
    }

    /// Non-blocking enqueue; `false` means the message was dropped.
    pub(crate) fn offer(&self, msg: M) -> bool {
        self.outbox.offer(msg)
    }

    /// Signals the worker. `Drain` only applies to a running worker, while
    /// `Discard` also cuts a drain short. Repeated requests are no-ops.
    pub(crate) fn request_stop(&self, mode: StopMode) {
        self.stop.send_if_modified(|current| {
            let next = match (*current, mode) {
                (StopMode::Running, m) => m,
                (StopMode::Drain, StopMode::Discard) => StopMode::Discard,
                _ => return false,
            };
            *current = next;
            true
        });
    }
}

impl<M> fmt::Debug for Subscriber<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("stop", &*self.stop.borrow())
            .finish()
    }
}

/// Handle returned by [`Broker::subscribe`](crate::broker::Broker::subscribe).
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`]
/// when the consumer no longer wants delivery.
pub struct Subscription<M> {
    inner: Arc<Subscriber<M>>,
    broker: Weak<Shared<M>>,
}

impl<M> Subscription<M> {
    pub(crate) fn new(inner: Arc<Subscriber<M>>, broker: Weak<Shared<M>>) -> Self {
        Self { inner, broker }
    }

    /// Broker-unique id of this subscription.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Topic this subscription listens on.
    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    /// Detaches the subscription and stops its worker, discarding any
    /// messages still queued for it. Once this returns no later publish will
    /// reach the handler. Calling it again has no effect.
    pub fn unsubscribe(&self) {
        if let Some(shared) = self.broker.upgrade() {
            shared.detach(&self.inner.topic, self.inner.id);
        }
        self.inner.request_stop(StopMode::Discard);
    }
}

impl<M> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("topic", &self.inner.topic)
            .finish()
    }
}

/// Delivery loop for one subscription.
///
/// `_alive` is a clone of the broker's liveness sender; it is dropped when the
/// worker returns, which is how `close` learns that every worker is done.
pub(crate) async fn run_worker<M, F, Fut>(
    id: SubscriberId,
    mut inbox: Inbox<M>,
    mut stop: watch::Receiver<StopMode>,
    handler: F,
    _alive: mpsc::Sender<()>,
) where
    F: Fn(M) -> Fut,
    Fut: Future<Output = ()>,
{
    debug!(subscription = id, "worker started");

    loop {
        tokio::select! {
            // a pending stop request wins over a ready message
            biased;

            changed = stop.changed() => {
                // sender gone means the entry was dropped without a request
                let mode = if changed.is_ok() { *stop.borrow_and_update() } else { StopMode::Drain };
                match mode {
                    StopMode::Running => continue,
                    StopMode::Discard => {
                        inbox.seal();
                        debug!(subscription = id, discarded = inbox.len(), "worker unsubscribed");
                        break;
                    }
                    StopMode::Drain => {
                        inbox.seal();
                        debug!(subscription = id, pending = inbox.len(), "worker draining");
                        while let Some(msg) = inbox.recv().await {
                            if *stop.borrow() == StopMode::Discard {
                                break;
                            }
                            handler(msg).await;
                        }
                        break;
                    }
                }
            }

            msg = inbox.recv() => match msg {
                Some(msg) => handler(msg).await,
                None => break,
            },
        }
    }

    debug!(subscription = id, "worker stopped");
}
