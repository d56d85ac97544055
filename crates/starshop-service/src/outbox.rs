//! Notifications waiting for the front end.
//!
//! Webhook settlements happen outside any conversation, so their messages
//! are queued here until the front end polls or posts its next event.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use starshop_core::Outgoing;

/// Queue of undelivered notifications.
///
/// Holds at most `capacity` messages; when full, the oldest is dropped.
#[derive(Debug)]
pub struct Outbox {
    queue: Mutex<VecDeque<Outgoing>>,
    capacity: usize,
}

impl Outbox {
    /// Default number of messages kept for a front end that does not poll.
    pub const DEFAULT_CAPACITY: usize = 1_000;

    /// Create an outbox holding at most `capacity` messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Queue a message.
    pub fn push(&self, message: Outgoing) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                tracing::warn!(
                    user_id = %dropped.user_id,
                    capacity = self.capacity,
                    "Outbox full, dropping oldest notification"
                );
            }
        }
        queue.push_back(message);
    }

    /// Take every queued message, oldest first.
    pub fn drain(&self) -> Vec<Outgoing> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starshop_core::UserId;

    #[test]
    fn drain_empties_in_order() {
        let outbox = Outbox::default();
        outbox.push(Outgoing::new(UserId::new(1), "first"));
        outbox.push(Outgoing::new(UserId::new(2), "second"));

        let drained = outbox.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].text, "first");
        assert!(outbox.drain().is_empty());
    }

    #[test]
    fn full_outbox_drops_the_oldest() {
        let outbox = Outbox::with_capacity(2);
        for text in ["first", "second", "third"] {
            outbox.push(Outgoing::new(UserId::new(1), text));
        }

        let drained: Vec<_> = outbox.drain().into_iter().map(|m| m.text).collect();
        assert_eq!(drained, vec!["second", "third"]);
    }
}
