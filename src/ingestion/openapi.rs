//! OpenAPI parsing: turns an OpenAPI 3.x or Swagger 2.0 document into an
//! [`InterfaceDescription`].
//!
//! Only the parts needed to proxy calls are read: paths, methods, parameters,
//! request bodies and the success response schema. Local `$ref`s are followed;
//! remote references are rejected.

use crate::error::AppError;
use crate::ingestion::types::{
    BodyEncoding, InterfaceDescription, OperationSpec, ParamLocation, ParameterSpec,
    RAW_BODY_PARAM,
};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Result type for schema parsing
type ParseResult<T> = std::result::Result<T, AppError>;

/// Methods in the order operations are enumerated within a path item.
const METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Maximum `$ref` hops before a reference chain is treated as a cycle.
const MAX_REF_DEPTH: usize = 32;

/// Keys copied from a Swagger 2.0 non-body parameter into its value schema.
const SWAGGER_SCHEMA_KEYS: [&str; 10] = [
    "type", "format", "items", "enum", "default", "minimum", "maximum", "pattern", "minLength",
    "maxLength",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    OpenApi3,
    Swagger2,
}

/// Parse an OpenAPI document.
///
/// # Errors
/// Returns `AppError::InvalidSchema` when the document is not a recognisable
/// OpenAPI 3.x / Swagger 2.0 object with a `paths` map, or when a reference
/// cannot be resolved.
pub fn parse_openapi(doc: &Value) -> ParseResult<InterfaceDescription> {
    let root = doc
        .as_object()
        .ok_or_else(|| invalid("document is not a JSON object"))?;
    let dialect = detect_dialect(root)?;

    let paths = root
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| invalid("missing 'paths' object"))?;

    let info = root.get("info");
    let title = info
        .and_then(|i| i.get("title"))
        .and_then(Value::as_str)
        .unwrap_or("API")
        .to_string();
    let version = info
        .and_then(|i| i.get("version"))
        .and_then(Value::as_str)
        .unwrap_or("0.0.0")
        .to_string();
    let description = info.and_then(|i| text_field(i, "description"));

    let mut operations = Vec::new();
    for (path, item) in paths {
        let item = resolve(doc, item)?
            .as_object()
            .ok_or_else(|| invalid(format!("path item '{}' is not an object", path)))?;
        let shared = item.get("parameters");

        for method in METHODS {
            let Some(operation) = item.get(method) else {
                continue;
            };
            operations.push(parse_operation(
                doc, dialect, path, method, operation, shared,
            )?);
        }
    }

    tracing::debug!(
        title = %title,
        operations = operations.len(),
        "Interface description parsed"
    );

    Ok(InterfaceDescription {
        title,
        version,
        description,
        operations,
    })
}

fn detect_dialect(root: &Map<String, Value>) -> ParseResult<Dialect> {
    if let Some(version) = root.get("openapi").and_then(Value::as_str) {
        if version.starts_with("3.") {
            return Ok(Dialect::OpenApi3);
        }
        return Err(invalid(format!("unsupported OpenAPI version {}", version)));
    }
    match root.get("swagger").and_then(Value::as_str) {
        Some("2.0") => Ok(Dialect::Swagger2),
        Some(other) => Err(invalid(format!("unsupported Swagger version {}", other))),
        None => Err(invalid("missing 'openapi' or 'swagger' version field")),
    }
}

fn parse_operation(
    doc: &Value,
    dialect: Dialect,
    path: &str,
    method: &str,
    operation: &Value,
    shared: Option<&Value>,
) -> ParseResult<OperationSpec> {
    let operation = resolve(doc, operation)?;
    let op = operation.as_object().ok_or_else(|| {
        invalid(format!(
            "operation {} {} is not an object",
            method.to_uppercase(),
            path
        ))
    })?;

    let mut parameters = Vec::new();
    let mut body = None;
    let mut body_required = false;

    // Path-level parameters first; operation-level entries override on (name, in).
    let mut declared: Vec<(&str, &str, &Value)> = Vec::new();
    for list in [shared, op.get("parameters")].into_iter().flatten() {
        let Some(list) = list.as_array() else {
            return Err(invalid(format!("parameters of {} are not an array", path)));
        };
        for raw in list {
            let param = resolve(doc, raw)?;
            let name = param
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(format!("parameter without 'name' in {}", path)))?;
            let location = param
                .get("in")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(format!("parameter '{}' without 'in'", name)))?;

            match declared
                .iter_mut()
                .find(|(n, l, _)| *n == name && *l == location)
            {
                Some(existing) => existing.2 = param,
                None => declared.push((name, location, param)),
            }
        }
    }

    for (name, location, param) in declared {
        let description = text_field(param, "description");
        let required = param
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let location = match location {
            "path" => ParamLocation::Path,
            "query" => ParamLocation::Query,
            "header" => ParamLocation::Header,
            "cookie" => {
                tracing::debug!(parameter = name, path, "Skipping cookie parameter");
                continue;
            }
            "body" if dialect == Dialect::Swagger2 => {
                let schema = param.get("schema");
                body = Some(body_parameters(doc, schema, required, false, &mut parameters)?);
                body_required = required;
                continue;
            }
            "formData" if dialect == Dialect::Swagger2 => {
                body = Some(BodyEncoding::Form);
                ParamLocation::Body
            }
            other => {
                return Err(invalid(format!(
                    "parameter '{}' has unsupported location '{}'",
                    name, other
                )))
            }
        };

        parameters.push(ParameterSpec {
            name: name.to_string(),
            location,
            // Path parameters are always required, whatever the document says.
            required: required || location == ParamLocation::Path,
            schema: parameter_schema(doc, dialect, param)?,
            description,
        });
    }

    if dialect == Dialect::OpenApi3 {
        if let Some(request_body) = op.get("requestBody") {
            body = request_body_parameters(doc, request_body, &mut parameters)?;
            body_required = resolve(doc, request_body)?
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false);
        }
    }

    Ok(OperationSpec {
        method: method.to_uppercase(),
        path: path.to_string(),
        operation_id: text_field(operation, "operationId"),
        summary: text_field(operation, "summary"),
        description: text_field(operation, "description"),
        tags: op
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        parameters,
        body,
        body_required,
        response_schema: response_schema(doc, dialect, op.get("responses"))?,
    })
}

/// Value schema of a non-body parameter.
fn parameter_schema(doc: &Value, dialect: Dialect, param: &Value) -> ParseResult<Value> {
    match dialect {
        Dialect::OpenApi3 => {
            let schema = param.get("schema").or_else(|| {
                param
                    .get("content")
                    .and_then(Value::as_object)
                    .and_then(|content| content.values().next())
                    .and_then(|media| media.get("schema"))
            });
            match schema {
                Some(schema) => Ok(resolve(doc, schema)?.clone()),
                None => Ok(Value::Object(Map::new())),
            }
        }
        Dialect::Swagger2 => {
            let mut schema = Map::new();
            for key in SWAGGER_SCHEMA_KEYS {
                if let Some(value) = param.get(key) {
                    schema.insert(key.to_string(), value.clone());
                }
            }
            Ok(Value::Object(schema))
        }
    }
}

/// Read an OpenAPI 3 `requestBody`, appending its body parameters.
fn request_body_parameters(
    doc: &Value,
    request_body: &Value,
    parameters: &mut Vec<ParameterSpec>,
) -> ParseResult<Option<BodyEncoding>> {
    let request_body = resolve(doc, request_body)?;
    let required = request_body
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let Some(content) = request_body.get("content").and_then(Value::as_object) else {
        return Ok(None);
    };

    let json_media = content
        .iter()
        .find(|(media_type, _)| is_json_media_type(media_type))
        .map(|(_, media)| media);
    if let Some(media) = json_media {
        let encoding = body_parameters(doc, media.get("schema"), required, false, parameters)?;
        return Ok(Some(encoding));
    }

    if let Some(media) = content.get("application/x-www-form-urlencoded") {
        let encoding = body_parameters(doc, media.get("schema"), required, true, parameters)?;
        return Ok(Some(encoding));
    }

    tracing::warn!(
        media_types = ?content.keys().collect::<Vec<_>>(),
        "Request body has no JSON or form media type; body will not be forwarded"
    );
    Ok(None)
}

/// Flatten a body schema into body-located parameters.
///
/// Object schemas with properties become one parameter per property. Anything
/// else (arrays, primitives, free-form objects) becomes a single raw `body`
/// parameter.
fn body_parameters(
    doc: &Value,
    schema: Option<&Value>,
    body_required: bool,
    form: bool,
    parameters: &mut Vec<ParameterSpec>,
) -> ParseResult<BodyEncoding> {
    let schema = match schema {
        Some(schema) => resolve(doc, schema)?.clone(),
        None => Value::Object(Map::new()),
    };

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        let required: HashSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for (name, property) in properties {
            let property = resolve(doc, property)?.clone();
            parameters.push(ParameterSpec {
                name: name.clone(),
                location: ParamLocation::Body,
                required: body_required && required.contains(name.as_str()),
                description: text_field(&property, "description"),
                schema: property,
            });
        }

        return Ok(if form {
            BodyEncoding::Form
        } else {
            BodyEncoding::JsonObject
        });
    }

    if form {
        return Ok(BodyEncoding::Form);
    }

    parameters.push(ParameterSpec {
        name: RAW_BODY_PARAM.to_string(),
        location: ParamLocation::Body,
        required: body_required,
        description: text_field(&schema, "description")
            .or_else(|| Some("Request body".to_string())),
        schema,
    });
    Ok(BodyEncoding::JsonRaw)
}

/// JSON schema of the first 2xx response.
fn response_schema(
    doc: &Value,
    dialect: Dialect,
    responses: Option<&Value>,
) -> ParseResult<Option<Value>> {
    let Some(responses) = responses.and_then(Value::as_object) else {
        return Ok(None);
    };
    let Some((_, response)) = responses.iter().find(|(code, _)| code.starts_with('2')) else {
        return Ok(None);
    };
    let response = resolve(doc, response)?;

    let schema = match dialect {
        Dialect::OpenApi3 => response
            .get("content")
            .and_then(Value::as_object)
            .and_then(|content| {
                content
                    .iter()
                    .find(|(media_type, _)| is_json_media_type(media_type))
                    .map(|(_, media)| media)
            })
            .and_then(|media| media.get("schema")),
        Dialect::Swagger2 => response.get("schema"),
    };

    match schema {
        Some(schema) => Ok(Some(resolve(doc, schema)?.clone())),
        None => Ok(None),
    }
}

/// Follow local `$ref` pointers until a concrete value is reached.
fn resolve<'a>(doc: &'a Value, mut value: &'a Value) -> ParseResult<&'a Value> {
    for _ in 0..MAX_REF_DEPTH {
        let Some(reference) = value.get("$ref").and_then(Value::as_str) else {
            return Ok(value);
        };
        let pointer = reference
            .strip_prefix('#')
            .ok_or_else(|| invalid(format!("external reference '{}' is not supported", reference)))?;
        value = doc
            .pointer(pointer)
            .ok_or_else(|| invalid(format!("unresolvable reference '{}'", reference)))?;
    }
    Err(invalid("reference chain too deep (cycle?)"))
}

fn is_json_media_type(media_type: &str) -> bool {
    let essence = media_type.split(';').next().unwrap_or("").trim();
    essence == "application/json" || essence.ends_with("+json")
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::InvalidSchema(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fastapi_document() -> Value {
        json!({
            "openapi": "3.1.0",
            "info": { "title": "Inventory", "version": "1.2.0" },
            "paths": {
                "/items/{item_id}": {
                    "parameters": [
                        { "name": "item_id", "in": "path", "required": true, "schema": { "type": "string" } }
                    ],
                    "get": {
                        "operationId": "get_item",
                        "summary": "Get Item",
                        "parameters": [
                            { "$ref": "#/components/parameters/Verbose" },
                            { "name": "session", "in": "cookie", "schema": { "type": "string" } }
                        ],
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Item" } } }
                            }
                        }
                    },
                    "put": {
                        "operationId": "update_item",
                        "requestBody": { "$ref": "#/components/requestBodies/ItemBody" },
                        "responses": { "204": { "description": "Updated" } }
                    }
                },
                "/items": {
                    "post": {
                        "tags": ["items"],
                        "requestBody": {
                            "content": { "application/json": { "schema": { "type": "array", "items": { "type": "string" } } } }
                        },
                        "responses": {}
                    }
                }
            },
            "components": {
                "parameters": {
                    "Verbose": { "name": "verbose", "in": "query", "schema": { "type": "boolean" } }
                },
                "requestBodies": {
                    "ItemBody": {
                        "required": true,
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Item" } } }
                    }
                },
                "schemas": {
                    "Item": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "description": "Display name" },
                            "price": { "type": "number" }
                        },
                        "required": ["name"]
                    }
                }
            }
        })
    }

    #[test]
    fn test_parse_preserves_document_order() {
        let description = parse_openapi(&fastapi_document()).unwrap();

        assert_eq!(description.title, "Inventory");
        assert_eq!(description.version, "1.2.0");
        let order: Vec<(String, String)> = description
            .operations
            .iter()
            .map(|op| (op.method.clone(), op.path.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("GET".to_string(), "/items/{item_id}".to_string()),
                ("PUT".to_string(), "/items/{item_id}".to_string()),
                ("POST".to_string(), "/items".to_string()),
            ]
        );
    }

    #[test]
    fn test_path_level_parameters_merge_and_cookies_are_skipped() {
        let description = parse_openapi(&fastapi_document()).unwrap();
        let get = &description.operations[0];

        let names: Vec<&str> = get.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["item_id", "verbose"]);
        assert_eq!(get.parameters[0].location, ParamLocation::Path);
        assert!(get.parameters[0].required);
        assert_eq!(get.parameters[1].location, ParamLocation::Query);
        assert_eq!(get.parameters[1].type_hint(), "boolean");
        assert!(!get.parameters[1].required);
        assert!(get.body.is_none());
    }

    #[test]
    fn test_operation_level_parameter_overrides_path_level() {
        let doc = json!({
            "openapi": "3.0.3",
            "paths": {
                "/things": {
                    "parameters": [{ "name": "limit", "in": "query", "schema": { "type": "string" } }],
                    "get": {
                        "parameters": [{ "name": "limit", "in": "query", "required": true, "schema": { "type": "integer" } }],
                        "responses": {}
                    }
                }
            }
        });

        let description = parse_openapi(&doc).unwrap();
        let params = &description.operations[0].parameters;
        assert_eq!(params.len(), 1);
        assert!(params[0].required);
        assert_eq!(params[0].type_hint(), "integer");
    }

    #[test]
    fn test_object_body_is_flattened() {
        let description = parse_openapi(&fastapi_document()).unwrap();
        let put = &description.operations[1];

        assert_eq!(put.body, Some(BodyEncoding::JsonObject));
        assert!(put.body_required);
        assert!(!description.operations[0].body_required);
        let body: Vec<&ParameterSpec> = put.parameters_in(ParamLocation::Body).collect();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0].name, "name");
        assert!(body[0].required);
        assert_eq!(body[0].description.as_deref(), Some("Display name"));
        assert_eq!(body[1].name, "price");
        assert!(!body[1].required);
    }

    #[test]
    fn test_array_body_becomes_raw_body_parameter() {
        let description = parse_openapi(&fastapi_document()).unwrap();
        let post = &description.operations[2];

        assert_eq!(post.body, Some(BodyEncoding::JsonRaw));
        assert_eq!(post.operation_id, None);
        assert_eq!(post.tags, vec!["items"]);
        assert_eq!(post.parameters.len(), 1);
        assert_eq!(post.parameters[0].name, RAW_BODY_PARAM);
        assert_eq!(post.parameters[0].type_hint(), "array");
    }

    #[test]
    fn test_response_schema_is_resolved() {
        let description = parse_openapi(&fastapi_document()).unwrap();
        let schema = description.operations[0].response_schema.as_ref().unwrap();
        assert_eq!(schema["type"], "object");
        assert!(description.operations[1].response_schema.is_none());
    }

    #[test]
    fn test_swagger2_body_and_form_parameters() {
        let doc = json!({
            "swagger": "2.0",
            "info": { "title": "Legacy", "version": "1" },
            "paths": {
                "/pets": {
                    "post": {
                        "operationId": "addPet",
                        "parameters": [{
                            "name": "pet", "in": "body", "required": true,
                            "schema": { "type": "object", "properties": { "kind": { "type": "string" } }, "required": ["kind"] }
                        }],
                        "responses": { "200": { "schema": { "type": "object" } } }
                    }
                },
                "/login": {
                    "post": {
                        "parameters": [
                            { "name": "user", "in": "formData", "type": "string", "required": true },
                            { "name": "limit", "in": "query", "type": "integer" }
                        ],
                        "responses": {}
                    }
                }
            }
        });

        let description = parse_openapi(&doc).unwrap();
        let add_pet = &description.operations[0];
        assert_eq!(add_pet.body, Some(BodyEncoding::JsonObject));
        assert_eq!(add_pet.parameters[0].name, "kind");
        assert!(add_pet.parameters[0].required);
        assert!(add_pet.response_schema.is_some());

        let login = &description.operations[1];
        assert_eq!(login.body, Some(BodyEncoding::Form));
        assert_eq!(login.parameters[0].location, ParamLocation::Body);
        assert_eq!(login.parameters[1].schema, json!({ "type": "integer" }));
    }

    #[test]
    fn test_form_request_body() {
        let doc = json!({
            "openapi": "3.0.0",
            "paths": {
                "/token": {
                    "post": {
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/x-www-form-urlencoded": {
                                    "schema": { "type": "object", "properties": { "username": { "type": "string" } }, "required": ["username"] }
                                }
                            }
                        },
                        "responses": {}
                    }
                }
            }
        });

        let description = parse_openapi(&doc).unwrap();
        let op = &description.operations[0];
        assert_eq!(op.body, Some(BodyEncoding::Form));
        assert!(op.parameters[0].required);
    }

    #[test]
    fn test_rejects_non_openapi_documents() {
        assert!(matches!(
            parse_openapi(&json!([1, 2, 3])),
            Err(AppError::InvalidSchema(_))
        ));
        assert!(matches!(
            parse_openapi(&json!({ "paths": {} })),
            Err(AppError::InvalidSchema(_))
        ));
        assert!(matches!(
            parse_openapi(&json!({ "openapi": "3.0.0" })),
            Err(AppError::InvalidSchema(_))
        ));
        assert!(matches!(
            parse_openapi(&json!({ "openapi": "4.0.0", "paths": {} })),
            Err(AppError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_unresolvable_and_cyclic_references_are_invalid() {
        let missing = json!({
            "openapi": "3.0.0",
            "paths": { "/a": { "get": { "parameters": [{ "$ref": "#/components/parameters/Nope" }] } } }
        });
        assert!(matches!(
            parse_openapi(&missing),
            Err(AppError::InvalidSchema(_))
        ));

        let cyclic = json!({
            "openapi": "3.0.0",
            "paths": { "/a": { "get": { "parameters": [{ "$ref": "#/components/parameters/A" }] } } },
            "components": { "parameters": {
                "A": { "$ref": "#/components/parameters/B" },
                "B": { "$ref": "#/components/parameters/A" }
            } }
        });
        assert!(matches!(
            parse_openapi(&cyclic),
            Err(AppError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_media_type_detection() {
        assert!(is_json_media_type("application/json"));
        assert!(is_json_media_type("application/json; charset=utf-8"));
        assert!(is_json_media_type("application/problem+json"));
        assert!(!is_json_media_type("multipart/form-data"));
    }
}
