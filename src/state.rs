use crate::config::Config;
use crate::error::Result;
use crate::registry::ToolRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Application state shared across all request handlers.
pub struct AppState {
    pub registry: ToolRegistry,
    /// Set once the first catalog is built.
    pub ready: AtomicBool,
    pub config: Arc<Config>,
}

impl AppState {
    /// Fetch the downstream schema and build the tool catalog.
    ///
    /// Fails without serving anything if the schema cannot be fetched, parsed
    /// or turned into a consistent catalog.
    pub async fn initialize(config: Config) -> Result<Self> {
        let registry = ToolRegistry::initialize(&config).await?;

        let state = Self {
            registry,
            ready: AtomicBool::new(false),
            config: Arc::new(config),
        };
        state.ready.store(true, Ordering::SeqCst);

        Ok(state)
    }

    /// Check if the service is ready to handle requests.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Name advertised in the MCP `initialize` reply.
    pub fn server_name(&self) -> String {
        match &self.config.server_name {
            Some(name) => name.clone(),
            None => format!("MCP Proxy for {}", self.registry.catalog().title),
        }
    }
}
