//! Session state machine
//!
//! Tracks a streaming session from registration to teardown.

use std::net::SocketAddr;
use std::time::Instant;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Subscriber registered, nothing written yet
    Init,
    /// Writing the log file snapshot
    Backfill,
    /// Forwarding queued lines and heartbeats
    LiveTail,
    /// Subscriber deregistered, connection released
    Teardown,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Session ID (same as the subscriber ID)
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// Session start time
    pub connected_at: Instant,

    /// Lines written during backfill
    pub backfill_lines: u64,

    /// Live lines written
    pub live_lines: u64,

    /// Heartbeats written
    pub heartbeats: u64,

    /// Total bytes written to the client
    pub bytes_sent: u64,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Init,
            connected_at: Instant::now(),
            backfill_lines: 0,
            live_lines: 0,
            heartbeats: 0,
            bytes_sent: 0,
        }
    }

    /// Transition to backfill
    pub fn start_backfill(&mut self) {
        if self.phase == SessionPhase::Init {
            self.phase = SessionPhase::Backfill;
        }
    }

    /// Transition to live tail
    pub fn start_live_tail(&mut self) {
        if self.phase == SessionPhase::Backfill {
            self.phase = SessionPhase::LiveTail;
        }
    }

    /// Enter teardown
    ///
    /// Returns true only on the first call.
    pub fn close(&mut self) -> bool {
        if self.phase == SessionPhase::Teardown {
            return false;
        }
        self.phase = SessionPhase::Teardown;
        true
    }

    pub fn on_backfill_line(&mut self, size: usize) {
        self.backfill_lines += 1;
        self.bytes_sent += size as u64;
    }

    pub fn on_live_line(&mut self, size: usize) {
        self.live_lines += 1;
        self.bytes_sent += size as u64;
    }

    pub fn on_heartbeat(&mut self) {
        self.heartbeats += 1;
        self.bytes_sent += 1;
    }

    /// Get session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Teardown
    }
}
