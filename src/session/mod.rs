//! Streaming subscriber sessions
//!
//! A session moves through `Init -> Backfill -> LiveTail -> Teardown`.
//! Teardown is the only terminal phase and is reached exactly once.

pub mod state;
pub mod tail;

pub use state::{SessionPhase, SessionState};
pub use tail::{SessionEnd, TailSession, HEARTBEAT};
