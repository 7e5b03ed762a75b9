//! Catalog construction: turns an [`InterfaceDescription`] into a
//! [`ToolCatalog`] of uniquely-named tools.
//!
//! Naming is deterministic. The operationId is used when present, otherwise a
//! slug is synthesised from method and path. When two operations produce the
//! same name, the first keeps it and later ones get `_2`, `_3`, ... in
//! document order.

use crate::catalog::types::{ToolCatalog, ToolDefinition};
use crate::config::ToolFilter;
use crate::error::{AppError, Result};
use crate::ingestion::{InterfaceDescription, OperationSpec, ParamLocation, ParameterSpec};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ToolCatalogBuilder {
    filter: ToolFilter,
    describe_response_schema: bool,
}

impl ToolCatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: ToolFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn describe_response_schema(mut self, enabled: bool) -> Self {
        self.describe_response_schema = enabled;
        self
    }

    /// Build the catalog.
    ///
    /// # Errors
    /// Returns `AppError::MalformedOperation` if a kept operation's path
    /// placeholders disagree with its declared path parameters.
    pub fn build(&self, description: InterfaceDescription) -> Result<ToolCatalog> {
        let total = description.operations.len();
        let mut taken: HashSet<String> = HashSet::with_capacity(total);
        let mut tools = Vec::with_capacity(total);

        for operation in description.operations {
            let base_name = candidate_name(&operation);
            if !self.keeps(&operation, &base_name) {
                tracing::debug!(operation = %operation.identifier(), "Operation filtered out");
                continue;
            }

            validate_path_parameters(&operation)?;

            let name = unique_name(&base_name, &taken);
            if name != base_name {
                tracing::debug!(
                    base = %base_name,
                    name = %name,
                    operation = %operation.identifier(),
                    "Resolved tool name collision"
                );
            }
            taken.insert(name.clone());

            let parameters = input_parameters(&operation);
            let input_schema = input_schema(&parameters);
            let text = self.tool_description(&operation);

            tools.push(ToolDefinition {
                name,
                description: text,
                parameters,
                input_schema,
                output_schema: operation.response_schema.clone(),
                operation: Arc::new(operation),
            });
        }

        let fingerprint = fingerprint(&tools);
        tracing::info!(
            operations = total,
            tools = tools.len(),
            fingerprint = %&fingerprint[..12],
            "Tool catalog built"
        );

        Ok(ToolCatalog::new(
            description.title,
            description.version,
            tools,
            fingerprint,
        ))
    }

    fn keeps(&self, operation: &OperationSpec, base_name: &str) -> bool {
        let filter = &self.filter;
        let matches_operation = |names: &[String]| {
            names
                .iter()
                .any(|n| n == base_name || operation.operation_id.as_deref() == Some(n.as_str()))
        };
        let matches_tag = |tags: &[String]| operation.tags.iter().any(|t| tags.contains(t));

        if !filter.include_operations.is_empty()
            && !matches_operation(&filter.include_operations[..])
        {
            return false;
        }
        if !filter.include_tags.is_empty() && !matches_tag(&filter.include_tags[..]) {
            return false;
        }
        !matches_operation(&filter.exclude_operations[..])
            && !matches_tag(&filter.exclude_tags[..])
    }

    fn tool_description(&self, operation: &OperationSpec) -> String {
        let mut text = match (&operation.summary, &operation.description) {
            (Some(summary), Some(description)) if summary != description => {
                format!("{}\n\n{}", summary, description)
            }
            (Some(summary), _) => summary.clone(),
            (None, Some(description)) => description.clone(),
            (None, None) => format!("{} {}", operation.method, operation.path),
        };

        if self.describe_response_schema {
            if let Some(schema) = &operation.response_schema {
                let pretty = serde_json::to_string_pretty(schema).unwrap_or_default();
                text.push_str("\n\n### Response schema\n\n```json\n");
                text.push_str(&pretty);
                text.push_str("\n```");
            }
        }
        text
    }
}

/// Sanitised operationId, or a slug derived from method and path.
fn candidate_name(operation: &OperationSpec) -> String {
    if let Some(id) = operation.operation_id.as_deref().and_then(sanitize_name) {
        return id;
    }

    let slug = operation
        .path
        .replace('/', "_")
        .replace(['{', '}'], "");
    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "root" } else { slug };
    let raw = format!("{}_{}", operation.method.to_lowercase(), slug);
    sanitize_name(&raw).unwrap_or(raw)
}

/// Restrict to the characters agent protocols accept in tool names.
fn sanitize_name(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Names of the `{placeholders}` in a path template, in order.
pub(crate) fn path_placeholders(path: &str) -> std::result::Result<Vec<String>, String> {
    let mut names = Vec::new();
    let mut current: Option<String> = None;

    for c in path.chars() {
        match c {
            '{' => {
                if current.is_some() {
                    return Err("nested '{' in path template".to_string());
                }
                current = Some(String::new());
            }
            '}' => {
                let Some(name) = current.take() else {
                    return Err("unmatched '}' in path template".to_string());
                };
                if name.is_empty() {
                    return Err("empty placeholder in path template".to_string());
                }
                names.push(name);
            }
            _ => {
                if let Some(name) = current.as_mut() {
                    name.push(c);
                }
            }
        }
    }

    if current.is_some() {
        return Err("unterminated placeholder in path template".to_string());
    }
    Ok(names)
}

fn validate_path_parameters(operation: &OperationSpec) -> Result<()> {
    let malformed = |reason: String| AppError::MalformedOperation {
        identifier: operation.identifier(),
        reason,
    };

    let placeholders = path_placeholders(&operation.path).map_err(malformed)?;
    let placeholder_set: HashSet<&str> = placeholders.iter().map(String::as_str).collect();
    if placeholder_set.len() != placeholders.len() {
        return Err(malformed("duplicate placeholder in path template".to_string()));
    }

    let declared: HashSet<&str> = operation
        .parameters_in(ParamLocation::Path)
        .map(|p| p.name.as_str())
        .collect();

    if let Some(missing) = placeholder_set.difference(&declared).next() {
        return Err(malformed(format!(
            "placeholder '{{{}}}' has no path parameter",
            missing
        )));
    }
    if let Some(extra) = declared.difference(&placeholder_set).next() {
        return Err(malformed(format!(
            "path parameter '{}' does not appear in the path",
            extra
        )));
    }
    Ok(())
}

/// Union of the operation's parameters with unique names; the first
/// declaration of a name wins, non-body locations before body properties.
fn input_parameters(operation: &OperationSpec) -> Vec<ParameterSpec> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut parameters = Vec::with_capacity(operation.parameters.len());

    let ordered = operation
        .parameters
        .iter()
        .filter(|p| p.location != ParamLocation::Body)
        .chain(operation.parameters_in(ParamLocation::Body));

    for param in ordered {
        if !seen.insert(param.name.as_str()) {
            tracing::warn!(
                operation = %operation.identifier(),
                parameter = %param.name,
                location = %param.location,
                "Dropping parameter that shadows an earlier one with the same name"
            );
            continue;
        }
        parameters.push(param.clone());
    }
    parameters
}

fn input_schema(parameters: &[ParameterSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in parameters {
        let mut schema = match &param.schema {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        if let Some(description) = &param.description {
            schema
                .entry("description")
                .or_insert_with(|| Value::String(description.clone()));
        }
        properties.insert(param.name.clone(), Value::Object(schema));
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn fingerprint(tools: &[ToolDefinition]) -> String {
    let mut hasher = Sha256::new();
    for tool in tools {
        hasher.update(tool.name.as_bytes());
        hasher.update(b"|");
        hasher.update(tool.operation.method.as_bytes());
        hasher.update(b" ");
        hasher.update(tool.operation.path.as_bytes());
        hasher.update(b"|");
        hasher.update(tool.input_schema.to_string().as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::parse_openapi;
    use serde_json::json;

    fn describe(paths: Value) -> InterfaceDescription {
        parse_openapi(&json!({
            "openapi": "3.0.3",
            "info": { "title": "Test API", "version": "1.0" },
            "paths": paths
        }))
        .unwrap()
    }

    fn path_param(name: &str) -> Value {
        json!({ "name": name, "in": "path", "required": true, "schema": { "type": "string" } })
    }

    #[test]
    fn test_get_item_exposes_required_id() {
        let description = describe(json!({
            "/items/{id}": { "get": { "operationId": "get_item", "parameters": [path_param("id")] } }
        }));

        let catalog = ToolCatalogBuilder::new().build(description).unwrap();
        let tool = catalog.get("get_item").unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(tool.input_schema["properties"]["id"]["type"], "string");
        assert_eq!(tool.input_schema["required"], json!(["id"]));
        assert_eq!(tool.operation.path, "/items/{id}");
        assert_eq!(catalog.title, "Test API");
    }

    #[test]
    fn test_path_placeholders_match_path_parameters() {
        let description = describe(json!({
            "/orgs/{org}/repos/{repo}/issues/{number}": {
                "get": {
                    "operationId": "get_issue",
                    "parameters": [path_param("org"), path_param("repo"), path_param("number"),
                        { "name": "expand", "in": "query", "schema": { "type": "string" } }]
                }
            }
        }));

        let catalog = ToolCatalogBuilder::new().build(description).unwrap();
        let tool = catalog.get("get_issue").unwrap();
        let placeholders = path_placeholders(&tool.operation.path).unwrap();
        let path_params: Vec<&str> = tool
            .parameters_in(ParamLocation::Path)
            .map(|p| p.name.as_str())
            .collect();

        assert_eq!(placeholders.len(), 3);
        assert_eq!(path_params.len(), placeholders.len());
        for name in &placeholders {
            assert!(path_params.contains(&name.as_str()));
        }
    }

    #[test]
    fn test_synthesized_names_from_method_and_path() {
        let description = describe(json!({
            "/users/{id}": { "get": { "parameters": [path_param("id")] } },
            "/": { "get": {} },
            "/v1/report.csv": { "post": {} }
        }));

        let catalog = ToolCatalogBuilder::new().build(description).unwrap();
        assert_eq!(
            catalog.names(),
            vec!["get_users_id", "get_root", "post_v1_report_csv"]
        );
    }

    #[test]
    fn test_collisions_get_ordered_suffixes() {
        let description = describe(json!({
            "/a": { "get": { "operationId": "list" }, "post": { "operationId": "list" } },
            "/b": { "get": { "operationId": "list" } },
            "/c": { "get": { "operationId": "list_2" } }
        }));

        let catalog = ToolCatalogBuilder::new().build(description).unwrap();
        assert_eq!(catalog.names(), vec!["list", "list_2", "list_3", "list_2_2"]);
        assert_eq!(catalog.get("list_2").unwrap().operation.method, "POST");
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let paths = json!({
            "/x/{id}": { "get": { "parameters": [path_param("id")] }, "delete": { "operationId": "get_x_id", "parameters": [path_param("id")] } },
            "/y": { "get": { "operationId": "get_x_id" } }
        });

        let first = ToolCatalogBuilder::new().build(describe(paths.clone())).unwrap();
        let second = ToolCatalogBuilder::new().build(describe(paths)).unwrap();

        assert_eq!(first.names(), second.names());
        assert_eq!(first.names(), vec!["get_x_id", "get_x_id_2", "get_x_id_3"]);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_undeclared_placeholder_is_malformed() {
        let description = describe(json!({
            "/items/{id}": { "get": { "operationId": "broken" } }
        }));

        let err = ToolCatalogBuilder::new().build(description).unwrap_err();
        match err {
            AppError::MalformedOperation { identifier, .. } => assert_eq!(identifier, "broken"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unused_path_parameter_is_malformed() {
        let description = describe(json!({
            "/items": { "get": { "parameters": [path_param("id")] } }
        }));

        let err = ToolCatalogBuilder::new().build(description).unwrap_err();
        match err {
            AppError::MalformedOperation { identifier, .. } => assert_eq!(identifier, "GET /items"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_placeholder_parsing_errors() {
        assert!(path_placeholders("/a/{b").is_err());
        assert!(path_placeholders("/a/b}").is_err());
        assert!(path_placeholders("/a/{}").is_err());
        assert!(path_placeholders("/a/{{b}}").is_err());
        assert_eq!(path_placeholders("/a/{b}/c/{d}").unwrap(), vec!["b", "d"]);
    }

    #[test]
    fn test_description_fallbacks() {
        let description = describe(json!({
            "/a": {
                "get": { "operationId": "both", "summary": "Short", "description": "Long form" },
                "post": { "operationId": "none" },
                "put": { "operationId": "same", "summary": "Same", "description": "Same" }
            }
        }));

        let catalog = ToolCatalogBuilder::new().build(description).unwrap();
        assert_eq!(catalog.get("both").unwrap().description, "Short\n\nLong form");
        assert_eq!(catalog.get("none").unwrap().description, "POST /a");
        assert_eq!(catalog.get("same").unwrap().description, "Same");
    }

    #[test]
    fn test_response_schema_appended_when_enabled() {
        let paths = json!({
            "/a": { "get": { "operationId": "a", "responses": { "200": {
                "content": { "application/json": { "schema": { "type": "object" } } }
            } } } }
        });

        let plain = ToolCatalogBuilder::new().build(describe(paths.clone())).unwrap();
        assert!(!plain.get("a").unwrap().description.contains("Response schema"));

        let detailed = ToolCatalogBuilder::new()
            .describe_response_schema(true)
            .build(describe(paths))
            .unwrap();
        let tool = detailed.get("a").unwrap();
        assert!(tool.description.contains("### Response schema"));
        assert_eq!(tool.output_schema, Some(json!({ "type": "object" })));
    }

    #[test]
    fn test_body_property_shadowed_by_query_parameter_is_dropped() {
        let description = describe(json!({
            "/a": { "post": {
                "operationId": "create",
                "parameters": [{ "name": "name", "in": "query", "schema": { "type": "string" } }],
                "requestBody": { "content": { "application/json": { "schema": {
                    "type": "object", "properties": { "name": { "type": "integer" }, "size": { "type": "integer" } }
                } } } }
            } }
        }));

        let catalog = ToolCatalogBuilder::new().build(description).unwrap();
        let tool = catalog.get("create").unwrap();
        assert_eq!(tool.parameters.len(), 2);
        assert_eq!(tool.parameter("name").unwrap().location, ParamLocation::Query);
        assert_eq!(tool.parameter("size").unwrap().location, ParamLocation::Body);
    }

    #[test]
    fn test_filters_apply_before_naming() {
        let paths = json!({
            "/a": { "get": { "operationId": "dup", "tags": ["public"] } },
            "/b": { "get": { "operationId": "dup", "tags": ["admin"] } },
            "/c": { "delete": { "operationId": "remove", "tags": ["public"] } }
        });

        let by_tag = ToolCatalogBuilder::new()
            .with_filter(ToolFilter {
                exclude_tags: vec!["admin".to_string()],
                ..ToolFilter::default()
            })
            .build(describe(paths.clone()))
            .unwrap();
        assert_eq!(by_tag.names(), vec!["dup", "remove"]);

        let by_operation = ToolCatalogBuilder::new()
            .with_filter(ToolFilter {
                include_tags: vec!["public".to_string()],
                exclude_operations: vec!["remove".to_string()],
                ..ToolFilter::default()
            })
            .build(describe(paths))
            .unwrap();
        assert_eq!(by_operation.names(), vec!["dup"]);
        assert_eq!(by_operation.get("dup").unwrap().operation.path, "/a");
    }

    #[test]
    fn test_filtered_out_malformed_operation_is_ignored() {
        let description = describe(json!({
            "/ok": { "get": { "operationId": "ok" } },
            "/bad/{id}": { "get": { "operationId": "bad" } }
        }));

        let catalog = ToolCatalogBuilder::new()
            .with_filter(ToolFilter {
                include_operations: vec!["ok".to_string()],
                ..ToolFilter::default()
            })
            .build(description)
            .unwrap();
        assert_eq!(catalog.names(), vec!["ok"]);
    }

    #[test]
    fn test_sanitize_operation_id() {
        assert_eq!(sanitize_name("users.get by-id").as_deref(), Some("users_get_by-id"));
        assert_eq!(sanitize_name("   "), None);
    }
}
