//! Unbounded multi-producer command queue.

use crossbeam_channel::{Receiver, Sender, TryIter};

/// Lock-free mailbox for value-type commands.
///
/// Posting never blocks and never fails: the mailbox owns both ends of an
/// unbounded crossbeam channel, so the receiving side cannot disconnect while
/// a sender exists. Any thread may take from the mailbox; the registry only
/// drains it from its sync point.
pub struct Mailbox<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> Mailbox<T> {
    /// Creates an empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    /// Posts a command. Safe to call from any number of threads.
    #[inline]
    pub fn post(&self, message: T) {
        if self.sender.send(message).is_err() {
            unreachable!("mailbox receiver is owned by the mailbox itself");
        }
    }

    /// Takes the oldest pending command, if any.
    #[inline]
    #[must_use]
    pub fn take(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Drains every command currently queued.
    ///
    /// Commands posted while the drain is in progress may or may not be
    /// observed by this iterator.
    pub fn drain(&self) -> TryIter<'_, T> {
        self.receiver.try_iter()
    }

    /// Discards all pending commands.
    pub fn clear(&self) {
        while self.receiver.try_recv().is_ok() {}
    }

    /// Number of pending commands (a snapshot under concurrency).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether no commands are pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
