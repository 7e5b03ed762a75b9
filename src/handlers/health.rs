use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub tools: usize,
    pub upstream: String,
    pub fingerprint: String,
}

/// GET /health - Liveness probe
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /ready - Readiness probe (catalog built and serving)
pub async fn ready_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadyResponse>) {
    let catalog = state.registry.catalog();
    let body = |status| ReadyResponse {
        status,
        tools: catalog.len(),
        upstream: state.config.upstream_url.to_string(),
        fingerprint: catalog.fingerprint().to_string(),
    };

    if state.is_ready() {
        (StatusCode::OK, Json(body("ready")))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body("not_ready")))
    }
}
