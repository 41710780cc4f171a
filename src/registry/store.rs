//! Subscriber registry implementation
//!
//! The shared set of live subscriber queues. All structural changes and the
//! broadcast push loop run under one mutex; pushes never block because each
//! queue is unbounded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::entry::{Subscriber, SubscriberEntry};

/// Registry of all active subscribers
///
/// The lock is never held across an `.await`.
#[derive(Debug)]
pub struct SubscriberRegistry {
    /// Map of subscriber ID to queue sender
    subscribers: Mutex<HashMap<u64, SubscriberEntry>>,

    /// Next subscriber ID to hand out
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new subscriber with its own queue
    ///
    /// The subscriber is fully built before it becomes visible to
    /// `broadcast`.
    pub fn register(self: &Arc<Self>) -> Subscriber {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicBool::new(true));

        let count = {
            let mut subscribers = self.subscribers.lock();
            subscribers.insert(id, SubscriberEntry::new(tx, Arc::clone(&live)));
            subscribers.len()
        };

        tracing::info!(subscriber_id = id, subscribers = count, "Subscriber added");

        Subscriber::new(id, rx, live, Arc::clone(self))
    }

    /// Remove a subscriber
    ///
    /// Returns false (and does nothing) if the subscriber is not registered.
    pub fn deregister(&self, id: u64) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers.lock();
            let removed = subscribers.remove(&id);
            (removed, subscribers.len())
        };

        match removed {
            Some(entry) => {
                entry.mark_dead();
                tracing::info!(subscriber_id = id, subscribers = count, "Subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Push a line onto every registered subscriber's queue
    ///
    /// Returns the number of queues that accepted the line. Entries whose
    /// receiver is already gone are pruned.
    pub fn broadcast(&self, line: Bytes) -> usize {
        let mut subscribers = self.subscribers.lock();
        let mut delivered = 0;

        subscribers.retain(|id, entry| {
            if entry.push(line.clone()) {
                delivered += 1;
                true
            } else {
                entry.mark_dead();
                tracing::debug!(subscriber_id = *id, "Pruned closed subscriber");
                false
            }
        });

        delivered
    }

    /// Remove every subscriber, closing their queues
    ///
    /// Sessions waiting on a queue observe it as closed once drained. The
    /// relay calls this on shutdown after the HTTP server has drained, so by
    /// then it only releases subscribers held outside a running session,
    /// such as ones taken straight from `Broadcaster::subscribe`.
    pub fn clear(&self) -> usize {
        let drained: Vec<SubscriberEntry> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.drain().map(|(_, entry)| entry).collect()
        };

        for entry in &drained {
            entry.mark_dead();
        }

        if !drained.is_empty() {
            tracing::info!(removed = drained.len(), "Subscribers cleared");
        }

        drained.len()
    }

    /// Check whether a subscriber is registered
    pub fn contains(&self, id: u64) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
