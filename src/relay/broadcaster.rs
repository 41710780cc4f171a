//! Broadcaster: single entry point for every ingested message
//!
//! Each message is decoded, stamped, appended to the log store and pushed to
//! every registered subscriber. The same serialized bytes go to the file and
//! to the queues.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::registry::{Subscriber, SubscriberRegistry};
use crate::stats::RelayStats;
use crate::store::{LogLine, LogStore, Snapshot};

/// Persists and fans out ingested messages
///
/// The store mutex serializes append + broadcast so the file order and the
/// order every subscriber observes are the same.
#[derive(Debug)]
pub struct Broadcaster {
    store: Mutex<LogStore>,
    registry: Arc<SubscriberRegistry>,
    stats: Arc<RelayStats>,
}

impl Broadcaster {
    /// Create a broadcaster over an opened store
    pub fn new(store: LogStore, registry: Arc<SubscriberRegistry>, stats: Arc<RelayStats>) -> Self {
        Self {
            store: Mutex::new(store),
            registry,
            stats,
        }
    }

    /// Open the log file at `path` with a fresh registry and stats
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let store = LogStore::open(path).await?;
        Ok(Self::new(
            store,
            Arc::new(SubscriberRegistry::new()),
            Arc::new(RelayStats::new()),
        ))
    }

    /// Get the subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Get the relay statistics
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Ingest one datagram payload
    ///
    /// Invalid UTF-8 is dropped. Trailing whitespace is trimmed. A failed
    /// append is logged and the line is still broadcast.
    ///
    /// Interior newlines are kept as-is, so a multi-line payload occupies
    /// several lines of the file and only the first carries the timestamp.
    pub async fn ingest(&self, payload: &[u8], from: SocketAddr) {
        self.stats.record_datagram();

        let text = match std::str::from_utf8(payload) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    peer = %from,
                    len = payload.len(),
                    error = %e,
                    "Dropping datagram with invalid UTF-8"
                );
                self.stats.record_decode_failure();
                return;
            }
        };

        let message = text.trim_end();
        tracing::debug!(peer = %from, payload = message, "Datagram received");

        self.publish(message).await;
    }

    async fn publish(&self, message: &str) -> LogLine {
        let mut store = self.store.lock().await;

        let line = LogLine::now(message);
        let bytes = line.to_bytes();

        if let Err(e) = store.append(&bytes).await {
            tracing::error!(
                path = %store.path().display(),
                error = %e,
                "Failed to append log line"
            );
            self.stats.record_persist_failure();
        }

        let delivered = self.registry.broadcast(bytes);
        drop(store);

        self.stats.record_ingested(delivered);
        tracing::trace!(subscribers = delivered, "Line broadcast");

        line
    }

    /// Register a subscriber and capture its backfill view
    ///
    /// Registration and the snapshot are taken under the ingest lock: every
    /// line lands either in the snapshot or in the new queue, never both.
    pub async fn subscribe(&self) -> (Subscriber, Snapshot) {
        let store = self.store.lock().await;
        let subscriber = self.registry.register();
        let snapshot = store.snapshot();

        (subscriber, snapshot)
    }
}
