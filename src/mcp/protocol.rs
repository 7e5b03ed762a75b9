//! MCP method dispatch over the tool registry.
//!
//! Supports the tool surface of the protocol: `initialize`, `ping`,
//! `tools/list`, `tools/call` and client notifications.

use crate::mcp::jsonrpc::{error_codes, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
use crate::proxy::TransportContext;
use crate::registry::InvocationResult;
use crate::state::AppState;
use serde::Deserialize;
use serde_json::{json, Value};

/// Protocol revisions this server speaks, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Handle one JSON-RPC message. Returns `None` for notifications, which get no reply.
pub async fn handle_request(
    state: &AppState,
    request: JsonRpcRequest,
    context: &TransportContext,
) -> Option<JsonRpcResponse> {
    if request.is_notification() {
        tracing::debug!(method = %request.method, "Notification received");
        return None;
    }

    let id = request.id.clone();
    if request.jsonrpc != JSONRPC_VERSION {
        return Some(JsonRpcResponse::error(
            id,
            error_codes::INVALID_REQUEST,
            format!("Invalid JSON-RPC version '{}'", request.jsonrpc),
        ));
    }

    tracing::debug!(method = %request.method, "Handling MCP request");
    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(id, initialize_result(state, request.params.as_ref())),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => JsonRpcResponse::success(
            id,
            json!({ "tools": state.registry.list_tools() }),
        ),
        "tools/call" => {
            let params = request.params.unwrap_or(Value::Null);
            match serde_json::from_value::<CallToolParams>(params) {
                Ok(params) => {
                    let result = state
                        .registry
                        .call_tool(&params.name, &params.arguments, context)
                        .await;
                    JsonRpcResponse::success(id, call_tool_result(&result))
                }
                Err(e) => JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid tools/call params: {}", e),
                ),
            }
        }
        other => JsonRpcResponse::error(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", other),
        ),
    };
    Some(response)
}

fn initialize_result(state: &AppState, params: Option<&Value>) -> Value {
    let requested = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str);
    let version = requested
        .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);

    json!({
        "protocolVersion": version,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": state.server_name(),
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// Render an invocation outcome as an MCP `CallToolResult`.
///
/// A completed call is never flagged as an error, whatever HTTP status the
/// downstream returned; the status travels in `structuredContent`.
pub fn call_tool_result(result: &InvocationResult) -> Value {
    match result {
        InvocationResult::Completed(response) => json!({
            "content": [{ "type": "text", "text": response.body_text() }],
            "structuredContent": response,
            "isError": false
        }),
        InvocationResult::Failed(failure) => json!({
            "content": [{ "type": "text", "text": format!("{}: {}", failure.kind, failure.message) }],
            "structuredContent": { "error": failure },
            "isError": true
        }),
    }
}
