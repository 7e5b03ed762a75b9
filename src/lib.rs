//! mcproxy - expose an OpenAPI-described HTTP service as MCP tools
//!
//! The library holds the schema ingestion, catalog building and proxying
//! engine behind the `mcproxy` binary, so integration tests and embedders can
//! drive it directly.

pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ingestion;
pub mod mcp;
pub mod proxy;
pub mod registry;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use catalog::{ToolCatalog, ToolCatalogBuilder, ToolDefinition};
pub use config::{ArgumentMode, Config, ToolFilter};
pub use error::{AppError, Result};
pub use ingestion::{parse_openapi, InterfaceDescription, OperationSpec, SchemaFetcher};
pub use proxy::{DownstreamRequest, ProxyExecutor, TransportContext};
pub use registry::{InvocationResult, ToolRegistry};
pub use router::build_router;
pub use state::AppState;
