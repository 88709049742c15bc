//! Health Check API Handlers
//!
//! Banner and health endpoints for monitoring.

use axum::{Json, extract::State, response::Html};
use cellserve_core::dto::health::HealthResponse;
use cellserve_runner::repository::StatusRepository;

use crate::state::AppState;

/// GET /
/// Landing banner
pub async fn index() -> Html<&'static str> {
    Html(
        "<h1>Hello</h1><p>This is the backend of our cellpose server, please visit our website.</p>",
    )
}

/// GET /health
/// Reports store reachability and worker pool load
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_healthy = match state.store().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Status store ping failed: {}", e);
            false
        }
    };

    Json(HealthResponse {
        status: if store_healthy { "ok" } else { "degraded" }.to_string(),
        store_healthy,
        pool: state.runner.stats(),
    })
}
