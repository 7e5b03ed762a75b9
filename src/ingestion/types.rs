//! Type definitions for the ingestion module.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Where a parameter travels on the downstream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Body => "body",
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding of the request payload for operations that take a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// Body-located parameters are object properties, sent as a JSON object.
    JsonObject,
    /// A single `body` parameter carries the whole JSON payload.
    JsonRaw,
    /// Body-located parameters are sent `application/x-www-form-urlencoded`.
    Form,
}

/// Name of the parameter exposed for non-object JSON bodies.
pub const RAW_BODY_PARAM: &str = "body";

/// One declared parameter of a downstream operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    /// JSON Schema fragment describing the value (the type hint).
    pub schema: Value,
    pub description: Option<String>,
}

impl ParameterSpec {
    /// The JSON Schema `type`, or "any" when undeclared.
    pub fn type_hint(&self) -> &str {
        self.schema
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("any")
    }
}

/// One downstream endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSpec {
    /// Upper-case HTTP method.
    pub method: String,
    /// Path template with `{name}` placeholders.
    pub path: String,
    /// The `operationId`, when the document declares one.
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub parameters: Vec<ParameterSpec>,
    /// `None` when the operation declares no request body.
    pub body: Option<BodyEncoding>,
    /// Whether the document marks the request body as required.
    pub body_required: bool,
    /// JSON schema of the first 2xx response, if any.
    pub response_schema: Option<Value>,
}

impl OperationSpec {
    /// Identifier used in logs and errors: the operationId or "METHOD path".
    pub fn identifier(&self) -> String {
        self.operation_id
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.method, self.path))
    }

    pub fn parameters_in(&self, location: ParamLocation) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }
}

/// A parsed interface description: the ordered set of operations of one service.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDescription {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    /// Operations in document order.
    pub operations: Vec<OperationSpec>,
}
