//! Maps a tool invocation back onto the concrete downstream HTTP request.
//!
//! Every argument is placed according to the location its parameter was
//! declared with. All validation happens here, before any network I/O.
//!
//! Credential pass-through: an `authorization` value carried by the
//! [`TransportContext`] is always sent as the downstream `Authorization`
//! header, whether or not the operation declares it. It is not part of the
//! argument bag and takes precedence over a declared header of the same name.

use crate::catalog::ToolDefinition;
use crate::config::ArgumentMode;
use crate::error::{AppError, Result};
use crate::ingestion::{BodyEncoding, ParamLocation, RAW_BODY_PARAM};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::{Map, Value};

/// Transport-level context of an invocation, outside the argument bag.
#[derive(Debug, Clone, Default)]
pub struct TransportContext {
    /// Raw `Authorization` header value received by the protocol layer.
    pub authorization: Option<String>,
}

impl TransportContext {
    pub fn with_authorization(value: impl Into<String>) -> Self {
        Self {
            authorization: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A fully-determined downstream call, relative to the upstream base URL.
#[derive(Debug, Clone)]
pub struct DownstreamRequest {
    pub method: Method,
    /// Path with placeholders substituted and percent-encoded.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

/// Translate an invocation of `tool` into a downstream request.
///
/// # Errors
/// * `InvalidArgument` if `args` is not an object (or null), a path value is a dot-segment,
///   or a header value is not sendable
/// * `UnknownParameter` for a key matching no declared parameter, in strict mode
/// * `MissingRequiredParameter` for an absent required parameter
pub fn translate(
    tool: &ToolDefinition,
    args: &Value,
    context: &TransportContext,
    mode: ArgumentMode,
) -> Result<DownstreamRequest> {
    let empty = Map::new();
    let args = match args {
        Value::Null => &empty,
        Value::Object(map) => map,
        other => {
            return Err(AppError::InvalidArgument {
                name: "arguments".to_string(),
                reason: format!("expected an object, got {}", json_type(other)),
            })
        }
    };

    for key in args.keys() {
        if tool.parameter(key).is_some() {
            continue;
        }
        match mode {
            ArgumentMode::Strict => {
                return Err(AppError::UnknownParameter { name: key.clone() });
            }
            ArgumentMode::Lenient => {
                tracing::debug!(tool = %tool.name, parameter = %key, "Dropping unknown argument");
            }
        }
    }

    let operation = &tool.operation;
    let method =
        Method::from_bytes(operation.method.as_bytes()).map_err(|_| AppError::MalformedOperation {
            identifier: operation.identifier(),
            reason: format!("unsupported method {}", operation.method),
        })?;

    let mut path = operation.path.clone();
    for param in tool.parameters_in(ParamLocation::Path) {
        let value = required_value(args, &param.name)?;
        let text = path_text(value);
        // URL parsing collapses dot-segments, even percent-encoded ones.
        if text == "." || text == ".." {
            return Err(AppError::InvalidArgument {
                name: param.name.clone(),
                reason: format!("'{}' is not a valid path segment", text),
            });
        }
        let encoded = urlencoding::encode(&text).into_owned();
        path = path.replace(&format!("{{{}}}", param.name), &encoded);
    }

    let mut query = Vec::new();
    for param in tool.parameters_in(ParamLocation::Query) {
        match present(args, &param.name) {
            Some(value) => push_pairs(&mut query, &param.name, value),
            None if param.required => {
                return Err(AppError::MissingRequiredParameter {
                    name: param.name.clone(),
                })
            }
            None => {}
        }
    }

    let mut headers = HeaderMap::new();
    for param in tool.parameters_in(ParamLocation::Header) {
        match present(args, &param.name) {
            Some(value) => {
                let name = HeaderName::from_bytes(param.name.as_bytes()).map_err(|e| {
                    AppError::InvalidArgument {
                        name: param.name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                headers.insert(name, header_value(&param.name, &scalar_text(value))?);
            }
            None if param.required => {
                return Err(AppError::MissingRequiredParameter {
                    name: param.name.clone(),
                })
            }
            None => {}
        }
    }

    if let Some(credential) = &context.authorization {
        headers.insert(AUTHORIZATION, header_value("authorization", credential)?);
    }

    let body = match operation.body {
        None => None,
        Some(encoding) => translate_body(tool, args, encoding, operation.body_required)?,
    };

    Ok(DownstreamRequest {
        method,
        path,
        query,
        headers,
        body,
    })
}

/// Serialise the body-located arguments per the declared encoding.
fn translate_body(
    tool: &ToolDefinition,
    args: &Map<String, Value>,
    encoding: BodyEncoding,
    body_required: bool,
) -> Result<Option<RequestBody>> {
    match encoding {
        // A non-body parameter named `body` shadows the raw body; then there is nothing to send.
        BodyEncoding::JsonRaw => match tool.parameter(RAW_BODY_PARAM) {
            Some(param) if param.location == ParamLocation::Body => {
                match present(args, RAW_BODY_PARAM) {
                    Some(value) => Ok(Some(RequestBody::Json(value.clone()))),
                    None if param.required => Err(AppError::MissingRequiredParameter {
                        name: RAW_BODY_PARAM.to_string(),
                    }),
                    None => Ok(None),
                }
            }
            _ => Ok(None),
        },
        BodyEncoding::JsonObject => {
            let mut payload = Map::new();
            for param in tool.parameters_in(ParamLocation::Body) {
                match present(args, &param.name) {
                    Some(value) => {
                        payload.insert(param.name.clone(), value.clone());
                    }
                    None if param.required => {
                        return Err(AppError::MissingRequiredParameter {
                            name: param.name.clone(),
                        })
                    }
                    None => {}
                }
            }
            if payload.is_empty() && !body_required {
                return Ok(None);
            }
            Ok(Some(RequestBody::Json(Value::Object(payload))))
        }
        BodyEncoding::Form => {
            let mut pairs = Vec::new();
            for param in tool.parameters_in(ParamLocation::Body) {
                match present(args, &param.name) {
                    Some(value) => push_pairs(&mut pairs, &param.name, value),
                    None if param.required => {
                        return Err(AppError::MissingRequiredParameter {
                            name: param.name.clone(),
                        })
                    }
                    None => {}
                }
            }
            Ok(Some(RequestBody::Form(pairs)))
        }
    }
}

/// An argument counts as absent when missing or JSON null.
fn present<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    args.get(name).filter(|v| !v.is_null())
}

fn required_value<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a Value> {
    present(args, name).ok_or_else(|| AppError::MissingRequiredParameter {
        name: name.to_string(),
    })
}

/// Arrays repeat the key (form style, exploded); everything else is one pair.
fn push_pairs(pairs: &mut Vec<(String, String)>, name: &str, value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items.iter().filter(|v| !v.is_null()) {
                pairs.push((name.to_string(), scalar_text(item)));
            }
        }
        other => pairs.push((name.to_string(), scalar_text(other))),
    }
}

/// Strings are sent bare; objects and arrays as compact JSON.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Path segments join arrays with commas (simple style).
fn path_text(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(","),
        other => scalar_text(other),
    }
}

fn header_value(name: &str, text: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(text).map_err(|e| AppError::InvalidArgument {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
