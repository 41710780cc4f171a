//! Durable log store
//!
//! A single append-only text file. Each entry is one [`LogLine`] in its
//! serialized form; the file is read back line by line for subscriber
//! backfill.

pub mod file;
pub mod line;

pub use file::{Backfill, LogStore, Snapshot};
pub use line::{LogLine, TIMESTAMP_FORMAT};
