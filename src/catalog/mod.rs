//! Tool catalog: the build-once, read-only mapping from tool names to the
//! downstream operations they invoke.

pub mod builder;
pub mod types;

pub use builder::ToolCatalogBuilder;
pub use types::{ToolCatalog, ToolDefinition, ToolSummary};
