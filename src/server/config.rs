//! Relay configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ingest::MAX_DATAGRAM_SIZE;

/// Default UDP ingestion port
pub const DEFAULT_UDP_PORT: u16 = 9999;

/// Default HTTP streaming port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default keep-alive interval for idle subscribers
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// UDP address datagrams are received on
    pub udp_addr: SocketAddr,

    /// HTTP address subscribers connect to
    pub http_addr: SocketAddr,

    /// Idle time before a heartbeat newline is written to a subscriber
    pub heartbeat_interval: Duration,

    /// Append-only log file
    pub log_path: PathBuf,

    /// HTML file served on `GET /`
    pub index_path: PathBuf,

    /// Maximum concurrent streaming subscribers (0 = unlimited)
    pub max_subscribers: usize,

    /// UDP receive buffer size; longer datagrams are truncated
    pub recv_buffer_size: usize,

    /// Stats log interval
    pub stats_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            udp_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_UDP_PORT)),
            http_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_HTTP_PORT)),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            log_path: PathBuf::from("logs.txt"),
            index_path: PathBuf::from("index.html"),
            max_subscribers: 0, // Unlimited
            recv_buffer_size: MAX_DATAGRAM_SIZE,
            stats_interval: Duration::from_secs(60),
        }
    }
}

impl RelayConfig {
    /// Set the UDP ingestion address
    pub fn udp_addr(mut self, addr: SocketAddr) -> Self {
        self.udp_addr = addr;
        self
    }

    /// Set the HTTP streaming address
    pub fn http_addr(mut self, addr: SocketAddr) -> Self {
        self.http_addr = addr;
        self
    }

    /// Set the heartbeat interval
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the log file path
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    /// Set the index page path
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = path.into();
        self
    }

    /// Set maximum concurrent subscribers
    pub fn max_subscribers(mut self, max: usize) -> Self {
        self.max_subscribers = max;
        self
    }

    /// Set the UDP receive buffer size
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size.min(MAX_DATAGRAM_SIZE);
        self
    }

    /// Set the stats log interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval.is_zero() {
            return Err(Error::Config("heartbeat interval must be non-zero".into()));
        }
        if self.stats_interval.is_zero() {
            return Err(Error::Config("stats interval must be non-zero".into()));
        }
        if self.recv_buffer_size == 0 {
            return Err(Error::Config("receive buffer size must be non-zero".into()));
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(Error::Config("log path must not be empty".into()));
        }
        Ok(())
    }
}
