use axum::extract::State;
use axum::Json;
use serde::Serialize;
use snapdoc_worker::DispatcherState;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Lifecycle state of the capture worker pool.
    pub dispatcher: String,
    /// Number of owners with a live status connection.
    pub connections: usize,
}

/// GET /health -- service status and capture pipeline state.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let dispatcher = state.service.dispatcher_state();
    let status = if dispatcher == DispatcherState::Running {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        dispatcher: dispatcher.to_string(),
        connections: state.ws_manager.connection_count().await,
    })
}
