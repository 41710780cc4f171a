//! UDP ingestion listener
//!
//! Receives datagrams and hands each payload to the broadcaster. Datagrams
//! are ingested one at a time in arrival order.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::error::{Error, Result};
use crate::relay::Broadcaster;
use crate::shutdown::ShutdownSignal;

/// Largest payload a UDP datagram can carry
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Datagram listener feeding a [`Broadcaster`]
pub struct IngestListener {
    socket: UdpSocket,
    local_addr: SocketAddr,
    broadcaster: Arc<Broadcaster>,
    buffer_size: usize,
}

impl IngestListener {
    /// Bind the listener to a local address
    pub async fn bind(addr: SocketAddr, broadcaster: Arc<Broadcaster>) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = socket.local_addr()?;

        tracing::info!(addr = %local_addr, "UDP listener bound");

        Ok(Self {
            socket,
            local_addr,
            broadcaster,
            buffer_size: MAX_DATAGRAM_SIZE,
        })
    }

    /// Set the receive buffer size; longer datagrams are truncated
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.clamp(1, MAX_DATAGRAM_SIZE);
        self
    }

    /// Get the bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive and ingest datagrams until shutdown
    ///
    /// Receive errors are logged and do not stop the loop.
    pub async fn run_until(self, mut shutdown: ShutdownSignal) {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!(addr = %self.local_addr, "UDP listener stopping");
            }
            _ = self.receive_loop() => {}
        }
    }

    async fn receive_loop(&self) {
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, peer)) => {
                    self.broadcaster.ingest(&buf[..len], peer).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "UDP receive error");
                }
            }
        }
    }
}
