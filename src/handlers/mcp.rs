//! MCP streamable-HTTP endpoint (JSON responses only).
//!
//! Clients POST one JSON-RPC message per request. Requests get a JSON reply,
//! notifications get `202 Accepted`. The incoming `Authorization` header
//! becomes the invocation's transport context and is forwarded downstream.

use crate::mcp::{error_codes, handle_request, JsonRpcRequest, JsonRpcResponse};
use crate::proxy::TransportContext;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

/// POST <mount path> - one JSON-RPC message
pub async fn mcp_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let context = TransportContext {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable MCP message");
            return rpc_error(None, error_codes::PARSE_ERROR, format!("Parse error: {}", e));
        }
    };

    if message.is_array() {
        return rpc_error(
            None,
            error_codes::INVALID_REQUEST,
            "Batch requests are not supported",
        );
    }

    let id = message.get("id").cloned();
    let request: JsonRpcRequest = match serde_json::from_value(message) {
        Ok(request) => request,
        Err(e) => {
            return rpc_error(
                id,
                error_codes::INVALID_REQUEST,
                format!("Invalid request: {}", e),
            )
        }
    };

    match handle_request(&state, request, &context).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// GET <mount path> - no server-initiated stream is offered
pub async fn mcp_stream_handler() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        "Server-sent event streams are not supported; POST JSON-RPC messages instead",
    )
}

fn rpc_error(id: Option<Value>, code: i32, message: impl Into<String>) -> Response {
    (
        StatusCode::OK,
        Json(JsonRpcResponse::error(id, code, message)),
    )
        .into_response()
}
