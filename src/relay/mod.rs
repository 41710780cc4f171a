//! Ingest fan-out
//!
//! ```text
//! datagram ──► Broadcaster::ingest ──┬──► LogStore::append
//!                                    └──► SubscriberRegistry::broadcast
//! ```

pub mod broadcaster;

pub use broadcaster::Broadcaster;
