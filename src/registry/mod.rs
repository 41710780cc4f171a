//! Subscriber registry for live fan-out
//!
//! The registry holds one unbounded queue per streaming subscriber and pushes
//! every ingested line onto all of them. Each session owns the receiving half
//! of its queue; the registry only keeps the sending half.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<SubscriberRegistry>
//!                     ┌─────────────────────────┐
//!                     │ subscribers: Mutex<     │
//!                     │   HashMap<id,           │
//!                     │     SubscriberEntry {   │
//!                     │       tx: Unbounded,    │
//!                     │     }>                  │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Broadcaster]          [Subscriber]            [Subscriber]
//!    ingest()               recv_timeout()          recv_timeout()
//!         │                       │                       │
//!         └──► registry.broadcast()──► TailSession ──► HTTP body
//! ```
//!
//! # Shared Lines
//!
//! Lines are `bytes::Bytes`, so pushing one line to N queues clones a
//! reference count, not the data.

pub mod entry;
pub mod store;

pub use entry::{Delivery, Subscriber};
pub use store::SubscriberRegistry;
