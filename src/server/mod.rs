//! Relay server: UDP ingestion plus HTTP streaming

pub mod config;
pub mod listener;
pub mod routes;

pub use config::RelayConfig;
pub use listener::RelayServer;
