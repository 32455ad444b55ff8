//! # locus-server
//!
//! Axum HTTP + WebSocket server and location broadcasting.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `registry` | Process-wide map of open sessions and last known positions |
//! | `relay` | Fan-out of location updates and disconnect notices |
//! | `websocket` | WebSocket upgrade, per-connection read/write loops |
//! | `http` | Router: map page, static assets, `/ws`, `/healthz`, `/metrics` |
//! | `settings` | Layered configuration (defaults → file → `LOCUS_*` env) |
//! | `metrics` | Prometheus recorder and metric name constants |
//! | `state` | Shared [`AppState`] handed to every handler |
//!
//! ## Data Flow
//!
//! `websocket::connection` reads a client frame → `relay` validates,
//! records it in `registry`, and enqueues one shared frame per peer →
//! each peer's write task drains its queue onto the socket.

#![deny(unsafe_code)]

pub mod http;
pub mod metrics;
pub mod registry;
pub mod relay;
pub mod settings;
pub mod state;
pub mod websocket;

pub use http::build_router;
pub use registry::{Peer, SessionRegistry};
pub use relay::Relay;
pub use settings::{ServerSettings, SettingsError};
pub use state::AppState;

use std::future::Future;

use thiserror::Error;
use tracing::info;

/// Errors that keep the server from coming up or tear it down.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Bind the configured address and serve until `shutdown` resolves.
///
/// Installs the global Prometheus recorder; call at most once per process.
pub async fn serve<S>(settings: ServerSettings, shutdown: S) -> Result<(), ServerError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let handle = metrics::install_recorder();
    let state = AppState::new(settings, handle);

    let addr = state.settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(%addr, assets_dir = %state.settings.assets_dir.display(), "listening");

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)
}
