//! Broker engine
//!
//! This module contains the in-memory broker responsible for:
//! - managing the topic → subscription registry
//! - starting one delivery worker per subscription
//! - fanning published messages out to subscriber mailboxes
//! - coordinated, deadline-bounded shutdown
//!
//! Concurrency and usage notes:
//! - `Broker` is a cheap handle (`Clone`) around shared state; there is no
//!   need to wrap it in `Arc<Mutex<_>>`.
//! - Registry mutations (subscribe, unsubscribe, close) take the exclusive
//!   lock; `publish` only takes the shared lock long enough to copy the
//!   subscriber list, then offers to each mailbox with no lock held.
//! - `publish` never waits on a subscriber. A full mailbox drops the message
//!   for that subscriber only.
//! - `subscribe` spawns onto the current tokio runtime and must be called
//!   from within one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::broker::mailbox::{MAILBOX_CAPACITY, mailbox};
use crate::broker::subscription::{StopMode, Subscriber, SubscriberId, Subscription, run_worker};
use crate::broker::topic::Topic;
use crate::utils::error::BrokerError;

/// In-process publish/subscribe broker, generic over the message type.
///
/// ```no_run
/// # async fn demo() -> Result<(), subpub::BrokerError> {
/// use std::time::Duration;
/// use subpub::Broker;
///
/// let broker = Broker::<String>::new();
/// let sub = broker.subscribe("news", |msg: String| async move {
///     println!("got {msg}");
/// })?;
/// broker.publish("news", "hello".to_string())?;
/// sub.unsubscribe();
/// broker.close(Duration::from_secs(1)).await?;
/// # Ok(())
/// # }
/// ```
pub struct Broker<M> {
    shared: Arc<Shared<M>>,
}

impl<M> Clone for Broker<M> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<M> std::fmt::Debug for Broker<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.read();
        f.debug_struct("Broker")
            .field("topics", &state.topics.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// State shared between the broker handle and subscription handles.
pub(crate) struct Shared<M> {
    state: RwLock<State<M>>,
    next_id: AtomicU64,
    mailbox_capacity: usize,
    /// Yields `None` once every worker has dropped its liveness sender.
    workers_done: AsyncMutex<mpsc::Receiver<()>>,
}

struct State<M> {
    topics: HashMap<String, Topic<M>>,
    closed: bool,
    /// Cloned into each worker; taken by `close` so the receiver can observe
    /// the last worker exiting.
    alive: Option<mpsc::Sender<()>>,
    workers: Arc<()>,
}

impl<M> Shared<M> {
    fn read(&self) -> RwLockReadGuard<'_, State<M>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State<M>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes a subscriber from its topic by id, dropping the topic entry
    /// once it has no subscribers left.
    pub(crate) fn detach(&self, topic: &str, id: SubscriberId) {
        let mut state = self.write();
        let Some(entry) = state.topics.get_mut(topic) else {
            return;
        };
        if entry.unsubscribe(id).is_some() {
            debug!(subscription = id, topic, "subscription detached");
        }
        if entry.is_empty() {
            state.topics.remove(topic);
        }
    }
}

impl<M> Default for Broker<M>
where
    M: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Broker<M>
where
    M: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::with_mailbox_capacity(MAILBOX_CAPACITY)
    }

    /// Creates a broker whose subscriptions buffer at most `capacity`
    /// messages each.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn with_mailbox_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "mailbox capacity must be non-zero");
        let (alive_tx, alive_rx) = mpsc::channel(1);
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(State {
                    topics: HashMap::new(),
                    closed: false,
                    alive: Some(alive_tx),
                    workers: Arc::new(()),
                }),
                next_id: AtomicU64::new(1),
                mailbox_capacity: capacity,
                workers_done: AsyncMutex::new(alive_rx),
            }),
        }
    }

    /// Subscribes `handler` to `topic` and starts its delivery worker.
    ///
    /// The handler is awaited for each message before the next one is taken,
    /// so calls for one subscription never overlap and arrive in publish
    /// order.
    ///
    /// # Errors
    /// Returns [`BrokerError::Closed`] once [`Broker::close`] has begun.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn subscribe<F, Fut>(
        &self,
        topic: impl Into<String>,
        handler: F,
    ) -> Result<Subscription<M>, BrokerError>
    where
        F: Fn(M) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let topic = topic.into();
        let mut state = self.shared.write();
        if state.closed {
            return Err(BrokerError::Closed);
        }
        let alive = state.alive.clone().ok_or(BrokerError::Closed)?;

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbox, inbox) = mailbox(self.shared.mailbox_capacity);
        let (stop_tx, stop_rx) = watch::channel(StopMode::Running);
        let subscriber = Arc::new(Subscriber::new(id, topic.clone(), outbox, stop_tx));

        let workers = state.workers.clone();
        tokio::spawn(async move {
            let _counted = workers;
            run_worker(id, inbox, stop_rx, handler, alive).await;
        });

        state
            .topics
            .entry(topic.clone())
            .or_insert_with(Topic::new)
            .subscribe(subscriber.clone());
        drop(state);

        info!(subscription = id, topic = %topic, "subscribed");
        Ok(Subscription::new(subscriber, Arc::downgrade(&self.shared)))
    }

    /// Offers `msg` to every current subscriber of `topic`.
    ///
    /// Never waits on subscribers: a subscriber whose mailbox is full simply
    /// misses this message. Publishing to a topic nobody listens on succeeds.
    ///
    /// # Errors
    /// Returns [`BrokerError::Closed`] once [`Broker::close`] has begun.
    pub fn publish(&self, topic: &str, msg: M) -> Result<(), BrokerError> {
        let subscribers = {
            let state = self.shared.read();
            if state.closed {
                return Err(BrokerError::Closed);
            }
            match state.topics.get(topic) {
                Some(entry) => entry.snapshot(),
                None => return Ok(()),
            }
        };

        if let Some((last, rest)) = subscribers.split_last() {
            for subscriber in rest {
                if !subscriber.offer(msg.clone()) {
                    trace!(subscription = subscriber.id, topic, "mailbox full, message dropped");
                }
            }
            if !last.offer(msg) {
                trace!(subscription = last.id, topic, "mailbox full, message dropped");
            }
        }
        Ok(())
    }

    /// Shuts the broker down.
    ///
    /// Marks the broker closed, detaches every subscription and tells each
    /// worker to finish what is already in its mailbox. Then waits, at most
    /// `deadline`, for all workers to exit. Workers are never interrupted: on
    /// timeout they keep running in the background.
    ///
    /// Calling `close` again waits for any remaining workers.
    ///
    /// # Errors
    /// Returns [`BrokerError::DeadlineExceeded`] if workers are still running
    /// when `deadline` elapses.
    pub async fn close(&self, deadline: Duration) -> Result<(), BrokerError> {
        let workers = {
            let mut state = self.shared.write();
            if !state.closed {
                state.closed = true;
                state.alive = None;
                let detached: usize = state
                    .topics
                    .drain()
                    .map(|(_, entry)| {
                        for subscriber in &entry.subscribers {
                            subscriber.request_stop(StopMode::Drain);
                        }
                        entry.subscribers.len()
                    })
                    .sum();
                info!(detached, "broker closing");
            }
            state.workers.clone()
        };

        let wait = async {
            let mut done = self.shared.workers_done.lock().await;
            while done.recv().await.is_some() {}
        };

        match tokio::time::timeout(deadline, wait).await {
            Ok(()) => {
                info!("broker closed");
                Ok(())
            }
            Err(_) => {
                // minus the local clone and the one held by the state
                let pending = Arc::strong_count(&workers).saturating_sub(2);
                warn!(?deadline, pending, "broker close deadline exceeded");
                Err(BrokerError::DeadlineExceeded { deadline, pending })
            }
        }
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.shared
            .read()
            .topics
            .get(topic)
            .map_or(0, |entry| entry.subscribers.len())
    }

    /// Whether [`Broker::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.read().closed
    }
}
