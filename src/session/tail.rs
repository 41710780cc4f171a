//! Streaming subscriber session
//!
//! One session per `/logs` connection: backfill from the log file, then the
//! live queue with a heartbeat deadline, until the client goes away or the
//! relay shuts down. Teardown runs exactly once on every exit path,
//! including the session future being dropped mid-await.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::registry::{Delivery, Subscriber};
use crate::relay::Broadcaster;
use crate::shutdown::ShutdownSignal;
use crate::stats::RelayStats;
use crate::store::Snapshot;

use super::state::{SessionPhase, SessionState};

/// Keep-alive written when the queue stays empty for a heartbeat interval
pub const HEARTBEAT: &[u8] = b"\n";

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A write to the client failed
    ClientGone(io::ErrorKind),
    /// The relay is shutting down
    Shutdown,
    /// The subscriber was removed from the registry
    ///
    /// Only `SubscriberRegistry::clear` does this. The relay's own shutdown
    /// ends sessions with `Shutdown` first.
    Closed,
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEnd::ClientGone(kind) => write!(f, "client disconnected ({:?})", kind),
            SessionEnd::Shutdown => write!(f, "shutdown"),
            SessionEnd::Closed => write!(f, "subscriber closed"),
        }
    }
}

/// A live tail of the log for one client
pub struct TailSession {
    state: SessionState,
    subscriber: Subscriber,
    snapshot: Snapshot,
    heartbeat_interval: Duration,
    stats: Arc<RelayStats>,
}

impl TailSession {
    /// Register a subscriber and prepare its backfill
    ///
    /// Registration happens here, strictly before any backfill read.
    pub async fn start(
        broadcaster: &Broadcaster,
        peer_addr: SocketAddr,
        heartbeat_interval: Duration,
    ) -> Self {
        let (subscriber, snapshot) = broadcaster.subscribe().await;
        let stats = Arc::clone(broadcaster.stats());
        stats.record_session_opened();

        tracing::debug!(
            session_id = subscriber.id(),
            peer = %peer_addr,
            backfill_bytes = ?snapshot.limit(),
            "Session started"
        );

        Self {
            state: SessionState::new(subscriber.id(), peer_addr),
            subscriber,
            snapshot,
            heartbeat_interval,
            stats,
        }
    }

    /// Session ID (same as the subscriber ID)
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    /// Run the session until the client disconnects or shutdown fires
    pub async fn run<W>(mut self, mut writer: W, mut shutdown: ShutdownSignal) -> SessionEnd
    where
        W: AsyncWrite + Unpin,
    {
        let end = tokio::select! {
            end = self.stream(&mut writer) => end,
            _ = shutdown.recv() => SessionEnd::Shutdown,
        };

        tracing::info!(
            session_id = self.state.id,
            peer = %self.state.peer_addr,
            reason = %end,
            backfill_lines = self.state.backfill_lines,
            live_lines = self.state.live_lines,
            heartbeats = self.state.heartbeats,
            bytes_sent = self.state.bytes_sent,
            duration_ms = self.state.duration().as_millis() as u64,
            "Session ended"
        );

        self.teardown();
        end
    }

    async fn stream<W>(&mut self, writer: &mut W) -> SessionEnd
    where
        W: AsyncWrite + Unpin,
    {
        self.state.start_backfill();
        if let Err(e) = self.backfill(writer).await {
            return SessionEnd::ClientGone(e.kind());
        }

        self.state.start_live_tail();
        self.live_tail(writer).await
    }

    /// Write the snapshot; read failures end the backfill, write failures
    /// end the session
    async fn backfill<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut backfill = match self.snapshot.clone().open().await {
            Ok(backfill) => backfill,
            Err(e) => {
                tracing::warn!(session_id = self.state.id, error = %e, "Backfill unavailable");
                return Ok(());
            }
        };

        loop {
            let line = match backfill.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        session_id = self.state.id,
                        lines = backfill.lines_read(),
                        error = %e,
                        "Backfill read failed"
                    );
                    break;
                }
            };

            write_chunk(writer, &line).await?;
            self.state.on_backfill_line(line.len());
        }

        tracing::debug!(
            session_id = self.state.id,
            lines = self.state.backfill_lines,
            "Backfill complete"
        );
        Ok(())
    }

    async fn live_tail<W>(&mut self, writer: &mut W) -> SessionEnd
    where
        W: AsyncWrite + Unpin,
    {
        loop {
            match self.subscriber.recv_timeout(self.heartbeat_interval).await {
                Delivery::Line(line) => {
                    if let Err(e) = write_chunk(writer, &line).await {
                        return SessionEnd::ClientGone(e.kind());
                    }
                    self.state.on_live_line(line.len());
                }
                Delivery::Idle => {
                    if let Err(e) = write_chunk(writer, HEARTBEAT).await {
                        return SessionEnd::ClientGone(e.kind());
                    }
                    self.state.on_heartbeat();
                    self.stats.record_heartbeat();
                }
                Delivery::Closed => return SessionEnd::Closed,
            }
        }
    }

    fn teardown(&mut self) {
        if !self.state.close() {
            return;
        }
        self.subscriber.deregister();
        self.stats.record_session_closed();
    }
}

impl Drop for TailSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn write_chunk<W>(writer: &mut W, chunk: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(chunk).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

    use super::*;
    use crate::shutdown::Shutdown;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

    async fn read_line<R>(reader: &mut BufReader<R>) -> String
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(30), reader.read_line(&mut line))
            .await
            .expect("line within timeout")
            .expect("read ok");
        line
    }

    #[tokio::test]
    async fn test_backfill_then_live() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");
        std::fs::write(&path, b"T1 - one\nT2 - two\n").unwrap();
        let broadcaster = Arc::new(Broadcaster::open(&path).await.unwrap());
        let shutdown = Shutdown::new();

        let session = TailSession::start(&broadcaster, peer(), HEARTBEAT_INTERVAL).await;
        assert_eq!(session.phase(), SessionPhase::Init);
        let (client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(session.run(server, shutdown.subscribe()));

        let mut reader = BufReader::new(client);
        assert_eq!(read_line(&mut reader).await, "T1 - one\n");
        assert_eq!(read_line(&mut reader).await, "T2 - two\n");

        broadcaster.ingest(b"three", peer()).await;
        let live = read_line(&mut reader).await;
        assert!(live.ends_with(" - three\n"));
        assert!(!live.starts_with("T1") && !live.starts_with("T2"));

        // Nothing else pending: the live line was not duplicated
        broadcaster.ingest(b"four", peer()).await;
        assert!(read_line(&mut reader).await.ends_with(" - four\n"));

        shutdown.trigger();
        assert_eq!(task.await.unwrap(), SessionEnd::Shutdown);
        assert!(broadcaster.registry().is_empty());
    }

    #[tokio::test]
    async fn test_empty_backfill_first_live_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");
        let broadcaster = Arc::new(Broadcaster::open(&path).await.unwrap());
        let shutdown = Shutdown::new();

        let session = TailSession::start(&broadcaster, peer(), HEARTBEAT_INTERVAL).await;
        let (client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(session.run(server, shutdown.subscribe()));

        broadcaster.ingest(b"hello", peer()).await;

        let mut reader = BufReader::new(client);
        let first = read_line(&mut reader).await;
        assert_eq!(first, std::fs::read_to_string(&path).unwrap());
        assert!(first.ends_with(" - hello\n"));

        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_on_idle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");
        let broadcaster = Arc::new(Broadcaster::open(&path).await.unwrap());
        let (mut other, _) = broadcaster.subscribe().await;
        let shutdown = Shutdown::new();

        let session = TailSession::start(&broadcaster, peer(), HEARTBEAT_INTERVAL).await;
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(session.run(server, shutdown.subscribe()));

        let started = tokio::time::Instant::now();
        let mut buf = [0u8; 1];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, HEARTBEAT);
        assert!(started.elapsed() >= HEARTBEAT_INTERVAL);

        // Keeps waiting after a heartbeat
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, HEARTBEAT);

        // Heartbeats are neither persisted nor broadcast
        assert!(std::fs::read(&path).unwrap().is_empty());
        assert_eq!(other.try_recv(), None);
        assert!(broadcaster.stats().snapshot().heartbeats_sent >= 2);

        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_write_failure_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");
        std::fs::write(&path, b"T1 - one\nT2 - two\n").unwrap();
        let broadcaster = Arc::new(Broadcaster::open(&path).await.unwrap());
        let shutdown = Shutdown::new();

        let writer = tokio_test::io::Builder::new()
            .write(b"T1 - one\n")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "client gone"))
            .build();

        let session = TailSession::start(&broadcaster, peer(), HEARTBEAT_INTERVAL).await;
        let id = session.id();
        assert!(broadcaster.registry().contains(id));

        let end = session.run(writer, shutdown.subscribe()).await;

        assert_eq!(end, SessionEnd::ClientGone(io::ErrorKind::BrokenPipe));
        assert!(!broadcaster.registry().contains(id));
        let snap = broadcaster.stats().snapshot();
        assert_eq!(snap.sessions_opened, 1);
        assert_eq!(snap.sessions_closed, 1);
    }

    #[tokio::test]
    async fn test_stalled_client_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");
        let broadcaster = Arc::new(Broadcaster::open(&path).await.unwrap());
        let shutdown = Shutdown::new();

        // Tiny pipe that is never read
        let stalled = TailSession::start(&broadcaster, peer(), HEARTBEAT_INTERVAL).await;
        let (_stalled_client, stalled_server) = tokio::io::duplex(8);
        let stalled_task = tokio::spawn(stalled.run(stalled_server, shutdown.subscribe()));

        let healthy = TailSession::start(&broadcaster, peer(), HEARTBEAT_INTERVAL).await;
        let (client, server) = tokio::io::duplex(64 * 1024);
        let healthy_task = tokio::spawn(healthy.run(server, shutdown.subscribe()));

        for i in 0..200 {
            broadcaster.ingest(format!("line {}", i).as_bytes(), peer()).await;
        }

        let mut reader = BufReader::new(client);
        for i in 0..200 {
            let line = read_line(&mut reader).await;
            assert!(line.ends_with(&format!(" - line {}\n", i)));
        }

        shutdown.trigger();
        assert_eq!(healthy_task.await.unwrap(), SessionEnd::Shutdown);
        assert_eq!(stalled_task.await.unwrap(), SessionEnd::Shutdown);
        assert!(broadcaster.registry().is_empty());
    }

    #[tokio::test]
    async fn test_closed_registry_ends_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");
        let broadcaster = Arc::new(Broadcaster::open(&path).await.unwrap());
        let shutdown = Shutdown::new();

        let session = TailSession::start(&broadcaster, peer(), HEARTBEAT_INTERVAL).await;
        let (_client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(session.run(server, shutdown.subscribe()));

        tokio::task::yield_now().await;
        broadcaster.registry().clear();

        let end = tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(end, SessionEnd::Closed);
    }

    #[tokio::test]
    async fn test_dropped_session_deregisters() {
        let dir = tempfile::tempdir().unwrap();
        let broadcaster = Arc::new(Broadcaster::open(dir.path().join("logs.txt")).await.unwrap());
        let shutdown = Shutdown::new();

        let session = TailSession::start(&broadcaster, peer(), HEARTBEAT_INTERVAL).await;
        let (_client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(session.run(server, shutdown.subscribe()));
        tokio::task::yield_now().await;

        task.abort();
        let _ = task.await;

        assert!(broadcaster.registry().is_empty());
        assert_eq!(broadcaster.stats().snapshot().sessions_closed, 1);
    }
}
