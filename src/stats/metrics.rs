//! Statistics for the relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Relay-wide counters
///
/// Updated with relaxed atomics from the ingest path and every session.
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    datagrams_received: AtomicU64,
    lines_ingested: AtomicU64,
    decode_failures: AtomicU64,
    persist_failures: AtomicU64,
    lines_delivered: AtomicU64,
    sessions_opened: AtomicU64,
    sessions_closed: AtomicU64,
    heartbeats_sent: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            datagrams_received: AtomicU64::new(0),
            lines_ingested: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            lines_delivered: AtomicU64::new(0),
            sessions_opened: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            heartbeats_sent: AtomicU64::new(0),
        }
    }

    pub fn record_datagram(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ingested line and how many queues it reached
    pub fn record_ingested(&self, delivered: usize) {
        self.lines_ingested.fetch_add(1, Ordering::Relaxed);
        self.lines_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heartbeat(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let sessions_opened = self.sessions_opened.load(Ordering::Relaxed);
        let sessions_closed = self.sessions_closed.load(Ordering::Relaxed);

        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            lines_ingested: self.lines_ingested.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            lines_delivered: self.lines_delivered.load(Ordering::Relaxed),
            sessions_opened,
            sessions_closed,
            active_sessions: sessions_opened.saturating_sub(sessions_closed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of the relay counters at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Time since the stats were created
    pub uptime: Duration,
    /// Datagrams read from the UDP socket
    pub datagrams_received: u64,
    /// Lines stamped and broadcast
    pub lines_ingested: u64,
    /// Datagrams dropped for invalid UTF-8
    pub decode_failures: u64,
    /// Lines that could not be appended to the log file
    pub persist_failures: u64,
    /// Sum over lines of the queues each line reached
    pub lines_delivered: u64,
    /// Streaming sessions started
    pub sessions_opened: u64,
    /// Streaming sessions torn down
    pub sessions_closed: u64,
    /// Sessions currently running
    pub active_sessions: u64,
    /// Keep-alive newlines written
    pub heartbeats_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = RelayStats::new();
        let snap = stats.snapshot();

        assert_eq!(snap.datagrams_received, 0);
        assert_eq!(snap.lines_ingested, 0);
        assert_eq!(snap.decode_failures, 0);
        assert_eq!(snap.persist_failures, 0);
        assert_eq!(snap.active_sessions, 0);
    }

    #[test]
    fn test_ingest_counters() {
        let stats = RelayStats::new();

        stats.record_datagram();
        stats.record_datagram();
        stats.record_decode_failure();
        stats.record_ingested(3);

        let snap = stats.snapshot();
        assert_eq!(snap.datagrams_received, 2);
        assert_eq!(snap.decode_failures, 1);
        assert_eq!(snap.lines_ingested, 1);
        assert_eq!(snap.lines_delivered, 3);
    }

    #[test]
    fn test_active_sessions() {
        let stats = RelayStats::new();

        stats.record_session_opened();
        stats.record_session_opened();
        stats.record_session_closed();

        let snap = stats.snapshot();
        assert_eq!(snap.sessions_opened, 2);
        assert_eq!(snap.sessions_closed, 1);
        assert_eq!(snap.active_sessions, 1);
    }
}
