//! HTTP surface: map page, static asset mount, WebSocket endpoint,
//! health check, and Prometheus metrics.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;
use crate::websocket::ws_handler;

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.settings.assets_dir);
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .nest_service("/assets", assets)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /` — the map page.
async fn index(State(state): State<AppState>) -> Response {
    let path = state.settings.assets_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(body) => Html(body).into_response(),
        Err(error) => {
            warn!(path = %path.display(), %error, "map page unavailable");
            (StatusCode::NOT_FOUND, "map page not found").into_response()
        }
    }
}

/// `GET /healthz` — liveness and session count.
async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "activeSessions": state.relay.registry().count(),
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
    }))
}

/// `GET /metrics` — Prometheus text format.
async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
