//! Datagram ingestion

pub mod listener;

pub use listener::{IngestListener, MAX_DATAGRAM_SIZE};
