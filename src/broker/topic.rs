//! Topic management
//!
//! A `Topic` holds the ordered list of live subscriptions for one topic name.
//! The name itself is the registry key and is not repeated here.
//! Subscriptions are kept in insertion order and removed by identity.
//!
//! Concurrency note: callers must hold the broker's registry lock when
//! modifying a `Topic`. Publishing works on a [`Topic::snapshot`] taken under
//! the shared lock so mailbox offers happen without any lock held.

use std::sync::Arc;

use crate::broker::subscription::{Subscriber, SubscriberId};

#[derive(Debug)]
pub(crate) struct Topic<M> {
    pub(crate) subscribers: Vec<Arc<Subscriber<M>>>,
}

impl<M> Topic<M> {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Append a subscriber. Ids are unique per broker so a subscriber can
    /// never be listed twice.
    pub(crate) fn subscribe(&mut self, subscriber: Arc<Subscriber<M>>) {
        debug_assert!(!self.subscribers.iter().any(|s| s.id == subscriber.id));
        self.subscribers.push(subscriber);
    }

    /// Remove a subscriber by id. Returns the removed entry, if it was listed.
    pub(crate) fn unsubscribe(&mut self, id: SubscriberId) -> Option<Arc<Subscriber<M>>> {
        let pos = self.subscribers.iter().position(|s| s.id == id)?;
        Some(self.subscribers.remove(pos))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<Subscriber<M>>> {
        self.subscribers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::mailbox::mailbox;
    use crate::broker::subscription::StopMode;
    use tokio::sync::watch;

    fn subscriber(id: SubscriberId) -> Arc<Subscriber<u8>> {
        let (outbox, _inbox) = mailbox(1);
        let (stop, _) = watch::channel(StopMode::Running);
        Arc::new(Subscriber::new(id, "t".to_string(), outbox, stop))
    }

    #[test]
    fn unsubscribe_removes_by_id_and_keeps_order() {
        let mut topic = Topic::new();
        for id in 1..=3 {
            topic.subscribe(subscriber(id));
        }

        assert_eq!(topic.unsubscribe(2).map(|s| s.id), Some(2));
        assert!(topic.unsubscribe(2).is_none());
        let ids: Vec<_> = topic.snapshot().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);

        topic.unsubscribe(1);
        topic.unsubscribe(3);
        assert!(topic.is_empty());
    }
}
