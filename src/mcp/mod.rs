//! MCP (Model Context Protocol) surface: JSON-RPC envelopes and method dispatch.

pub mod jsonrpc;
pub mod protocol;

pub use jsonrpc::{error_codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use protocol::{call_tool_result, handle_request, SUPPORTED_PROTOCOL_VERSIONS};
