//! Subscriber entries and handles
//!
//! The registry keeps a [`SubscriberEntry`] (sending half of the queue plus a
//! liveness flag). The session keeps the [`Subscriber`] (receiving half). The
//! queue itself is owned by the session; dropping the handle deregisters it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use super::store::SubscriberRegistry;

/// Registry-side reference to one subscriber queue
#[derive(Debug)]
pub(super) struct SubscriberEntry {
    tx: mpsc::UnboundedSender<Bytes>,
    live: Arc<AtomicBool>,
}

impl SubscriberEntry {
    pub(super) fn new(tx: mpsc::UnboundedSender<Bytes>, live: Arc<AtomicBool>) -> Self {
        Self { tx, live }
    }

    /// Push a line without blocking
    ///
    /// Returns false when the receiving side is gone.
    pub(super) fn push(&self, line: Bytes) -> bool {
        self.tx.send(line).is_ok()
    }

    pub(super) fn mark_dead(&self) {
        self.live.store(false, Ordering::Release);
    }
}

/// Outcome of waiting on a subscriber queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Next queued line
    Line(Bytes),
    /// The deadline elapsed with nothing queued
    Idle,
    /// The subscriber was removed from the registry
    Closed,
}

/// Session-side handle to a registered subscriber
///
/// Holds the receiving half of the subscriber's unbounded queue.
/// Deregistration happens on drop, so every exit path releases the
/// registry slot.
#[derive(Debug)]
pub struct Subscriber {
    id: u64,
    rx: mpsc::UnboundedReceiver<Bytes>,
    live: Arc<AtomicBool>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscriber {
    pub(super) fn new(
        id: u64,
        rx: mpsc::UnboundedReceiver<Bytes>,
        live: Arc<AtomicBool>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            id,
            rx,
            live,
            registry,
        }
    }

    /// Unique subscriber ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the subscriber is still registered
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Wait for the next line, giving up after `deadline`
    pub async fn recv_timeout(&mut self, deadline: Duration) -> Delivery {
        match tokio::time::timeout(deadline, self.rx.recv()).await {
            Ok(Some(line)) => Delivery::Line(line),
            Ok(None) => Delivery::Closed,
            Err(_) => Delivery::Idle,
        }
    }

    /// Take a queued line if one is ready
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Remove this subscriber from the registry
    ///
    /// Returns false if it was already removed.
    pub fn deregister(&self) -> bool {
        self.registry.deregister(self.id)
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}
