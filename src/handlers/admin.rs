use crate::error::Result;
use crate::registry::ReloadOutcome;
use crate::state::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;

/// POST /reload - Re-fetch the downstream schema and swap the catalog.
///
/// On failure the previous catalog keeps serving and the error is returned
/// (502 for upstream problems, 500 for a malformed schema).
pub async fn reload_handler(State(state): State<Arc<AppState>>) -> Result<Json<ReloadOutcome>> {
    let outcome = state.registry.reload().await?;
    Ok(Json(outcome))
}
