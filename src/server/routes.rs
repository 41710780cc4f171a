//! HTTP routes
//!
//! `GET /logs` streams a [`TailSession`] as a chunked `text/plain` body.
//! `GET /` serves the configured index page.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::Semaphore;

use crate::relay::Broadcaster;
use crate::session::TailSession;
use crate::shutdown::Shutdown;

/// Buffer between a session and its response body
///
/// A client that stops reading fills this and stalls its own session only.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Shared state for the route handlers
#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Arc<Broadcaster>,
    pub heartbeat_interval: Duration,
    pub index_path: Arc<PathBuf>,
    pub shutdown: Shutdown,
    /// Subscriber slots (`None` = unlimited)
    pub permits: Option<Arc<Semaphore>>,
}

/// Build the relay router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/logs", get(tail_logs))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Response {
    match tokio::fs::read(state.index_path.as_path()).await {
        Ok(page) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], page).into_response(),
        Err(e) => {
            tracing::warn!(
                path = %state.index_path.display(),
                error = %e,
                "Index page unavailable"
            );
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn tail_logs(
    State(state): State<AppState>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
) -> Response {
    // Check subscriber limit
    let permit = match state.permits {
        Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(peer = %peer_addr, "Subscriber rejected: limit reached");
                return (StatusCode::SERVICE_UNAVAILABLE, "subscriber limit reached\n")
                    .into_response();
            }
        },
        None => None,
    };

    let session = TailSession::start(&state.broadcaster, peer_addr, state.heartbeat_interval).await;
    let session_id = session.id();
    let (reader, writer) = tokio::io::duplex(PIPE_CAPACITY);
    let shutdown = state.shutdown.subscribe();

    tokio::spawn(async move {
        let _permit = permit;
        let end = session.run(writer, shutdown).await;
        tracing::debug!(session_id = session_id, reason = %end, "Session task finished");
    });

    (
        [(header::CONTENT_TYPE, "text/plain")],
        Body::from_stream(body_stream(reader)),
    )
        .into_response()
}

/// Turn the read half of a session pipe into a body stream
///
/// Ends when the session drops its write half.
fn body_stream(reader: DuplexStream) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    stream::unfold(reader, |mut reader| async move {
        let mut buf = BytesMut::with_capacity(8 * 1024);
        match reader.read_buf(&mut buf).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(buf.freeze()), reader)),
            Err(e) => Some((Err(e), reader)),
        }
    })
}
