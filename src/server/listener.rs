//! Relay server
//!
//! Binds the UDP ingestion socket and the HTTP streaming socket, then runs
//! both until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::ingest::IngestListener;
use crate::relay::Broadcaster;
use crate::server::config::RelayConfig;
use crate::server::routes::{self, AppState};
use crate::shutdown::Shutdown;

/// UDP-to-HTTP log relay
pub struct RelayServer {
    config: RelayConfig,
    broadcaster: Arc<Broadcaster>,
    ingest: IngestListener,
    http: TcpListener,
    http_addr: SocketAddr,
    shutdown: Shutdown,
}

impl RelayServer {
    /// Open the log file and bind both sockets
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        config.validate()?;

        let broadcaster = Arc::new(Broadcaster::open(&config.log_path).await?);
        tracing::info!(path = %config.log_path.display(), "Log file ready");

        let ingest = IngestListener::bind(config.udp_addr, Arc::clone(&broadcaster))
            .await?
            .buffer_size(config.recv_buffer_size);

        let http = TcpListener::bind(config.http_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: config.http_addr,
                source,
            })?;
        let http_addr = http.local_addr()?;
        tracing::info!(addr = %http_addr, "HTTP server listening");

        Ok(Self {
            config,
            broadcaster,
            ingest,
            http,
            http_addr,
            shutdown: Shutdown::new(),
        })
    }

    /// Get the bound UDP address
    pub fn udp_addr(&self) -> SocketAddr {
        self.ingest.local_addr()
    }

    /// Get the bound HTTP address
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Get the broadcaster
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Get a handle that stops the server when triggered
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run the relay until `signal` resolves or the shutdown handle fires
    ///
    /// Every streaming session is stopped and deregistered before this
    /// returns.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            config,
            broadcaster,
            ingest,
            http,
            shutdown,
            ..
        } = self;

        let ingest_task = tokio::spawn(ingest.run_until(shutdown.subscribe()));
        let stats_task = spawn_stats_task(Arc::clone(&broadcaster), config.stats_interval);

        let permits = if config.max_subscribers > 0 {
            Some(Arc::new(Semaphore::new(config.max_subscribers)))
        } else {
            None
        };

        let state = AppState {
            broadcaster: Arc::clone(&broadcaster),
            heartbeat_interval: config.heartbeat_interval,
            index_path: Arc::new(config.index_path.clone()),
            shutdown: shutdown.clone(),
            permits,
        };
        let app = routes::router(state);

        let trigger = shutdown.clone();
        let mut stopped = shutdown.subscribe();
        let graceful = async move {
            tokio::select! {
                _ = signal => tracing::info!("Shutdown signal received"),
                _ = stopped.recv() => {}
            }
            trigger.trigger();
        };

        let result = axum::serve(http, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(graceful)
            .await;

        // Make sure everything stops even if the HTTP server failed
        shutdown.trigger();
        if let Err(e) = ingest_task.await {
            tracing::error!(error = %e, "UDP listener task failed");
        }
        stats_task.abort();
        broadcaster.registry().clear();

        let snap = broadcaster.stats().snapshot();
        tracing::info!(
            lines_ingested = snap.lines_ingested,
            sessions_opened = snap.sessions_opened,
            "Relay stopped"
        );

        result.map_err(Error::Io)
    }
}

/// Periodically log relay statistics
fn spawn_stats_task(broadcaster: Arc<Broadcaster>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snap = broadcaster.stats().snapshot();
            tracing::info!(
                uptime_secs = snap.uptime.as_secs(),
                datagrams = snap.datagrams_received,
                lines = snap.lines_ingested,
                decode_failures = snap.decode_failures,
                persist_failures = snap.persist_failures,
                subscribers = broadcaster.registry().len(),
                heartbeats = snap.heartbeats_sent,
                "Relay stats"
            );
        }
    })
}
