use crate::handlers::{
    health_handler, mcp_handler, mcp_stream_handler, ready_handler, reload_handler,
};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Largest accepted MCP message.
const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// Build the HTTP surface: the MCP endpoint at the configured mount path plus
/// probes and the reload trigger.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mount_path = state.config.mount_path.clone();

    Router::new()
        .route(
            &mount_path,
            post(mcp_handler)
                .get(mcp_stream_handler)
                .layer(DefaultBodyLimit::max(MAX_MESSAGE_BYTES)),
        )
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/reload", post(reload_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
