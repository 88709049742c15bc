//! API Module
//!
//! HTTP API layer for the server.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod job;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router with all endpoints
///
/// # Arguments
/// * `state` - Shared application state
/// * `body_limit` - Largest accepted request body, in bytes
pub fn create_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        // Banner and health check
        .route("/", get(health::index))
        .route("/health", get(health::health_check))
        // Submission endpoints
        .route("/upload", post(job::upload))
        .route("/train", post(job::train))
        // Result endpoints
        .route("/status", get(job::status))
        .route("/preview", get(job::preview))
        .route("/dl", get(job::download))
        // Add state and middleware
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
