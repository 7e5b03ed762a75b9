use std::env;
use std::time::Duration;
use url::Url;

/// How the request translator treats argument keys that match no declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentMode {
    /// Reject the invocation with `UnknownParameter`.
    Strict,
    /// Drop unknown keys and proceed.
    Lenient,
}

impl ArgumentMode {
    pub fn from_env() -> Self {
        Self::parse(&env::var("MCPROXY_ARGUMENTS").unwrap_or_default())
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "lenient" | "drop" | "ignore" => Self::Lenient,
            _ => Self::Strict,
        }
    }
}

/// Operation filters applied before tools are named.
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    /// Keep only these operations (by operationId or derived tool name). Empty keeps all.
    pub include_operations: Vec<String>,
    pub exclude_operations: Vec<String>,
    /// Keep only operations carrying at least one of these tags. Empty keeps all.
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
}

impl ToolFilter {
    pub fn is_empty(&self) -> bool {
        self.include_operations.is_empty()
            && self.exclude_operations.is_empty()
            && self.include_tags.is_empty()
            && self.exclude_tags.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Base URL of the downstream HTTP service.
    pub upstream_url: Url,
    /// Path of the OpenAPI document under `upstream_url`.
    pub schema_path: String,
    /// Route under which the MCP endpoint is served.
    pub mount_path: String,
    pub request_timeout: Duration,
    pub schema_timeout: Duration,
    pub shutdown_timeout_secs: u64,
    pub argument_mode: ArgumentMode,
    pub filter: ToolFilter,
    /// Overrides the advertised MCP server name.
    pub server_name: Option<String>,
    /// Append the success response schema to each tool description.
    pub describe_response_schema: bool,
}

impl Config {
    /// Configuration with defaults for everything but the downstream URL.
    pub fn new(upstream_url: Url) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            upstream_url,
            schema_path: "/openapi.json".to_string(),
            mount_path: "/mcp".to_string(),
            request_timeout: Duration::from_secs(30),
            schema_timeout: Duration::from_secs(10),
            shutdown_timeout_secs: 5,
            argument_mode: ArgumentMode::Strict,
            filter: ToolFilter::default(),
            server_name: None,
            describe_response_schema: false,
        }
    }

    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let upstream_url = Url::parse(
            &env::var("UPSTREAM_URL").unwrap_or_else(|_| "http://localhost:6673".to_string()),
        )?;
        let defaults = Self::new(upstream_url);

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()?,
            schema_path: normalize_route(
                &env::var("SCHEMA_PATH").unwrap_or(defaults.schema_path),
            ),
            mount_path: normalize_route(&env::var("MOUNT_PATH").unwrap_or(defaults.mount_path)),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
            ),
            schema_timeout: Duration::from_secs(
                env::var("SCHEMA_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            ),
            shutdown_timeout_secs: env::var("SHUTDOWN_TIMEOUT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            argument_mode: ArgumentMode::from_env(),
            filter: ToolFilter {
                include_operations: list_var("INCLUDE_OPERATIONS"),
                exclude_operations: list_var("EXCLUDE_OPERATIONS"),
                include_tags: list_var("INCLUDE_TAGS"),
                exclude_tags: list_var("EXCLUDE_TAGS"),
            },
            server_name: env::var("SERVER_NAME").ok().filter(|s| !s.is_empty()),
            describe_response_schema: env::var("DESCRIBE_RESPONSE_SCHEMA")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            upstream_url: defaults.upstream_url,
        })
    }
}

fn list_var(key: &str) -> Vec<String> {
    env::var(key).map(|v| split_list(&v)).unwrap_or_default()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ensure a leading slash and no trailing slash ("/" stays "/").
fn normalize_route(route: &str) -> String {
    let trimmed = route.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
