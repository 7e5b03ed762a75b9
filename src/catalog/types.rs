//! Tool catalog types.

use crate::ingestion::{OperationSpec, ParamLocation, ParameterSpec};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// An agent-facing tool bound to exactly one downstream operation.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Unique within the catalog.
    pub name: String,
    pub description: String,
    /// Input shape: every parameter the tool accepts, tagged with its location.
    /// Names are unique.
    pub parameters: Vec<ParameterSpec>,
    /// JSON Schema object advertised to the agent, derived from `parameters`.
    pub input_schema: Value,
    pub output_schema: Option<Value>,
    pub operation: Arc<OperationSpec>,
}

impl ToolDefinition {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameters_in(&self, location: ParamLocation) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }

    /// Protocol-facing summary used by `tools/list`.
    pub fn summary(&self) -> ToolSummary {
        ToolSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Ordered, immutable mapping of tool name to definition.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    /// Title of the source interface description.
    pub title: String,
    pub version: String,
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
    fingerprint: String,
}

impl ToolCatalog {
    /// Tool names must already be unique; later duplicates are unreachable by name.
    pub(crate) fn new(
        title: String,
        version: String,
        tools: Vec<ToolDefinition>,
        fingerprint: String,
    ) -> Self {
        let index = tools
            .iter()
            .enumerate()
            .map(|(i, tool)| (tool.name.clone(), i))
            .collect();
        Self {
            title,
            version,
            tools,
            index,
            fingerprint,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Tools in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Hex SHA-256 over tool names, bindings and input shapes.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}
