//! # log-relay
//!
//! Receives log messages over UDP, appends each as a timestamped line to a
//! plain-text file and streams every line live to any number of HTTP
//! subscribers.
//!
//! ```text
//! UDP datagram ──► IngestListener ──► Broadcaster ──┬──► logs.txt
//!                                                   └──► SubscriberRegistry
//!                                                          │  │  │
//!                                                 TailSession (one per GET /logs)
//! ```
//!
//! A subscriber first receives the current file content (backfill), then
//! every new line as it arrives, with a bare `\n` heartbeat whenever the
//! stream has been idle for the heartbeat interval.
//!
//! # Example
//! ```no_run
//! use log_relay::{RelayConfig, RelayServer};
//!
//! # async fn example() -> log_relay::error::Result<()> {
//! let server = RelayServer::bind(RelayConfig::default()).await?;
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ingest;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod stats;
pub mod store;

pub use error::{Error, Result};
pub use relay::Broadcaster;
pub use server::{RelayConfig, RelayServer};
