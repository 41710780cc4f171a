//! log-relay server
//!
//! Run with: cargo run --bin log-relay -- [OPTIONS]
//!
//! Send a line:
//!   echo "hello" | nc -u -w0 localhost 9999
//!
//! Follow the log:
//!   curl -N http://localhost:8080/logs

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log_relay::server::config::{DEFAULT_HTTP_PORT, DEFAULT_UDP_PORT};
use log_relay::{RelayConfig, RelayServer};

#[derive(Parser)]
#[command(name = "log-relay")]
#[command(about = "Append UDP log messages to a file and stream them live over HTTP")]
struct Cli {
    /// Address to bind both listeners to
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// UDP port log messages are received on
    #[arg(long, default_value_t = DEFAULT_UDP_PORT)]
    udp_port: u16,

    /// HTTP port subscribers connect to
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
    http_port: u16,

    /// Seconds of idle time before a heartbeat newline is sent
    #[arg(long, default_value_t = 5)]
    heartbeat_secs: u64,

    /// Append-only log file
    #[arg(long, default_value = "logs.txt")]
    log_file: PathBuf,

    /// HTML page served on GET /
    #[arg(long, default_value = "index.html")]
    index: PathBuf,

    /// Maximum concurrent subscribers (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_subscribers: usize,

    /// Seconds between stats log lines
    #[arg(long, default_value_t = 60)]
    stats_secs: u64,
}

impl Cli {
    fn into_config(self) -> RelayConfig {
        RelayConfig::default()
            .udp_addr(SocketAddr::new(self.bind, self.udp_port))
            .http_addr(SocketAddr::new(self.bind, self.http_port))
            .heartbeat_interval(Duration::from_secs(self.heartbeat_secs))
            .log_path(self.log_file)
            .index_path(self.index)
            .max_subscribers(self.max_subscribers)
            .stats_interval(Duration::from_secs(self.stats_secs))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("log_relay=info".parse()?),
        )
        .init();

    let config = Cli::parse().into_config();
    let server = RelayServer::bind(config).await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await?;

    Ok(())
}
