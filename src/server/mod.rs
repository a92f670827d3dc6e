//! HTTP boundary: thin handlers over the session service plus the SSE
//! console feed. All protocol behavior lives in [`crate::session`]; handlers
//! only deserialize, call the service, and map errors.

pub mod error;
pub mod routes;
pub mod stream;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::console::ConsoleBus;
use crate::session::SimService;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: SimService,
    pub bus: Arc<ConsoleBus>,
    /// Default grace period for `/api/quit` when the request names none.
    pub quit_grace: Duration,
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(routes::status))
        .route("/api/start", post(routes::start))
        .route("/api/command", post(routes::command))
        .route("/api/escape", post(routes::escape))
        .route(
            "/api/registers/{reference}",
            get(routes::examine).put(routes::deposit),
        )
        .route("/api/breakpoints", get(routes::breakpoints))
        .route("/api/quit", post(routes::quit))
        .route("/api/stop", post(routes::stop))
        .route("/api/console", get(routes::console))
        .with_state(state)
}

/// Bind the configured address, trying the next hundred ports when the
/// requested one is busy.
pub async fn bind_listener(bind_addr: &str) -> io::Result<TcpListener> {
    let requested: SocketAddr = bind_addr
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{bind_addr}: {e}")))?;

    let start_port = requested.port();
    for port in start_port..=start_port.saturating_add(100) {
        let candidate = SocketAddr::new(requested.ip(), port);
        match TcpListener::bind(candidate).await {
            Ok(listener) => {
                tracing::info!(addr = %candidate, "listening");
                return Ok(listener);
            }
            Err(e) => {
                tracing::debug!(port, %e, "port busy");
            }
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AddrInUse,
        format!(
            "no available port in range {}-{}",
            start_port,
            start_port.saturating_add(100)
        ),
    ))
}
