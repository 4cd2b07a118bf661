//! Health endpoints served next to the webhook.
//!
//! Hosting platforms probe `GET /` or `GET /health` to decide whether the
//! service is alive; both answer with the same JSON body.

use std::time::Instant;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "ok" while the process is serving.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Seconds since the router was built.
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone)]
struct HealthState {
    started: Instant,
}

/// GET / and GET /health - Health check endpoint.
async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started.elapsed().as_secs(),
    })
}

/// Creates the health router.
pub fn health_router() -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(HealthState {
            started: Instant::now(),
        })
}
