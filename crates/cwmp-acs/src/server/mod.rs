//! HTTP surface of the ACS.
//!
//! CPEs POST to the configured endpoint path; operators probe `GET /health`.

mod health;
mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::engine::AcsEngine;
use crate::storage::AcsDatabase;

pub use health::HealthResponse;
pub use routes::SESSION_COOKIE;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AcsEngine>,
    pub db: AcsDatabase,
}

/// HTTP-level settings.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub endpoint_path: String,
    pub max_body_bytes: usize,
}

pub fn build_router(state: AppState, config: &RouterConfig) -> Router {
    Router::new()
        .route(&config.endpoint_path, post(routes::cwmp))
        .route("/health", get(health::health))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
