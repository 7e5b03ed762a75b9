use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Downstream service unreachable: {0}")]
    UnreachableService(String),

    #[error("Invalid interface schema: {0}")]
    InvalidSchema(String),

    #[error("Schema endpoint returned HTTP {status}")]
    SchemaHttpError { status: u16 },

    #[error("Malformed operation '{identifier}': {reason}")]
    MalformedOperation { identifier: String, reason: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Missing required parameter: {name}")]
    MissingRequiredParameter { name: String },

    #[error("Unknown parameter: {name}")]
    UnknownParameter { name: String },

    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Downstream request timed out after {timeout_ms}ms")]
    DownstreamTimeout { timeout_ms: u64 },

    #[error("Downstream connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid downstream response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Stable machine-readable identifier, used in structured invocation failures
    /// and as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::UnreachableService(_) => "unreachable_service",
            AppError::InvalidSchema(_) => "invalid_schema",
            AppError::SchemaHttpError { .. } => "schema_http_error",
            AppError::MalformedOperation { .. } => "malformed_operation",
            AppError::UnknownTool { .. } => "unknown_tool",
            AppError::MissingRequiredParameter { .. } => "missing_required_parameter",
            AppError::UnknownParameter { .. } => "unknown_parameter",
            AppError::InvalidArgument { .. } => "invalid_argument",
            AppError::DownstreamTimeout { .. } => "downstream_timeout",
            AppError::ConnectionFailed(_) => "connection_failed",
            AppError::InvalidResponse(_) => "invalid_response",
            AppError::Config(_) => "config",
        }
    }

    /// Errors raised while turning arguments into a downstream request.
    pub fn is_translation_error(&self) -> bool {
        matches!(
            self,
            AppError::UnknownTool { .. }
                | AppError::MissingRequiredParameter { .. }
                | AppError::UnknownParameter { .. }
                | AppError::InvalidArgument { .. }
        )
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
    code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::UnreachableService(_)
            | AppError::InvalidSchema(_)
            | AppError::SchemaHttpError { .. }
            | AppError::ConnectionFailed(_)
            | AppError::InvalidResponse(_) => {
                tracing::error!(error = %self, "Upstream error");
                StatusCode::BAD_GATEWAY
            }
            AppError::DownstreamTimeout { .. } => {
                tracing::warn!(error = %self, "Upstream timeout");
                StatusCode::GATEWAY_TIMEOUT
            }
            AppError::MalformedOperation { .. } | AppError::Config(_) => {
                tracing::error!(error = %self, "Internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::UnknownTool { .. } => StatusCode::NOT_FOUND,
            AppError::MissingRequiredParameter { .. }
            | AppError::UnknownParameter { .. }
            | AppError::InvalidArgument { .. } => {
                tracing::warn!(error = %self, "Validation error");
                StatusCode::BAD_REQUEST
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            kind: self.kind(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
