//! Router assembly and the plain-HTTP surface (health, metrics).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use pulse_auth::TokenVerifier;

use crate::config::HubConfig;
use crate::websocket::bridge::{UpdateBridge, UpdateBus};
use crate::websocket::connection::ws_handler;
use crate::websocket::registry::Registry;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Live connection indexes.
    pub registry: Arc<Registry>,
    /// Handshake credential gate.
    pub verifier: Arc<TokenVerifier>,
    /// Process-wide envelope bus.
    pub bus: UpdateBus,
    /// Hub configuration.
    pub config: Arc<HubConfig>,
    /// Installed Prometheus recorder, when metrics are enabled.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state from configuration.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        let verifier = Arc::new(TokenVerifier::new(&config.token_secret));
        let bus = UpdateBus::new(config.bus_capacity);
        Self {
            registry: Arc::new(Registry::new()),
            verifier,
            bus,
            config: Arc::new(config),
            metrics: None,
        }
    }

    /// Attach an installed Prometheus recorder for the `/metrics` route.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Spawn the single fan-out loop for this process.
    pub fn spawn_bridge(&self) -> tokio::task::JoinHandle<()> {
        let bridge = UpdateBridge::new(Arc::clone(&self.registry), &self.bus);
        tokio::spawn(bridge.run())
    }
}

/// Assemble the hub router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_endpoint))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Process liveness plus a connection count for dashboards.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connections": state.registry.connection_count(),
    }))
}

/// Prometheus text exposition, when a recorder is installed.
async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
