//! Mailbox
//!
//! A bounded FIFO feeding one subscription's delivery worker. The sending half
//! lives in the broker registry and is only ever used with a non-blocking
//! `try_send`; when the queue is full the message is dropped (drop-tail).

use tokio::sync::mpsc::{self, error::TrySendError};

/// Number of messages a mailbox buffers before it starts dropping.
pub const MAILBOX_CAPACITY: usize = 1024;

/// Creates a mailbox with room for `capacity` pending messages.
pub(crate) fn mailbox<M>(capacity: usize) -> (Outbox<M>, Inbox<M>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Outbox { tx }, Inbox { rx })
}

/// Producer side, held by the registry entry.
#[derive(Debug)]
pub(crate) struct Outbox<M> {
    tx: mpsc::Sender<M>,
}

impl<M> Outbox<M> {
    /// Attempts to enqueue without waiting. Returns `false` when the message
    /// was dropped because the mailbox is full or its worker has stopped.
    pub(crate) fn offer(&self, msg: M) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Consumer side, owned by the delivery worker.
#[derive(Debug)]
pub(crate) struct Inbox<M> {
    rx: mpsc::Receiver<M>,
}

impl<M> Inbox<M> {
    pub(crate) async fn recv(&mut self) -> Option<M> {
        self.rx.recv().await
    }

    /// Refuses further enqueues. Messages already buffered stay readable and
    /// `recv` returns `None` once they are consumed.
    pub(crate) fn seal(&mut self) {
        self.rx.close();
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offer_drops_when_full() {
        let (outbox, mut inbox) = mailbox::<u32>(2);
        assert!(outbox.offer(1));
        assert!(outbox.offer(2));
        assert!(!outbox.offer(3));
        assert_eq!(inbox.len(), 2);

        assert_eq!(inbox.recv().await, Some(1));
        assert!(outbox.offer(4));
        assert_eq!(inbox.recv().await, Some(2));
        assert_eq!(inbox.recv().await, Some(4));
    }

    #[tokio::test]
    async fn sealed_mailbox_drains_then_ends() {
        let (outbox, mut inbox) = mailbox::<&str>(4);
        assert!(outbox.offer("a"));
        assert!(outbox.offer("b"));
        inbox.seal();

        assert!(!outbox.offer("c"));
        assert_eq!(inbox.recv().await, Some("a"));
        assert_eq!(inbox.recv().await, Some("b"));
        assert_eq!(inbox.recv().await, None);
    }
}
