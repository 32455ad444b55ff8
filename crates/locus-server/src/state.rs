//! Shared server state passed into each handler.

use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::relay::Relay;
use crate::settings::ServerSettings;

/// State accessible from every Axum handler.
///
/// The relay (and the registry it owns) is constructed once at startup and
/// travels by `Arc` into each connection handler — no ambient global.
#[derive(Clone)]
pub struct AppState {
    /// Fan-out relay over the session registry.
    pub relay: Arc<Relay>,
    /// Loaded server settings.
    pub settings: Arc<ServerSettings>,
    /// Handle used to render the `/metrics` endpoint.
    pub metrics: PrometheusHandle,
    /// When the server started.
    pub started_at: Instant,
}

impl AppState {
    /// Build fresh state around an empty relay.
    #[must_use]
    pub fn new(settings: ServerSettings, metrics: PrometheusHandle) -> Self {
        Self {
            relay: Arc::new(Relay::new()),
            settings: Arc::new(settings),
            metrics,
            started_at: Instant::now(),
        }
    }
}
