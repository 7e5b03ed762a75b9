pub mod admin;
pub mod health;
pub mod mcp;

pub use admin::reload_handler;
pub use health::{health_handler, ready_handler};
pub use mcp::{mcp_handler, mcp_stream_handler};
