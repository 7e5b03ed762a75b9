//! The tool registry: composition root of the proxy.
//!
//! Owns the schema fetcher, the current catalog and the downstream executor,
//! and runs the per-invocation cycle:
//!
//! `RECEIVED → TRANSLATING → {TRANSLATION_FAILED | DISPATCHED} →
//! {COMPLETED | TIMED_OUT | CONNECTION_FAILED | INVALID_RESPONSE}`
//!
//! Every failure state is terminal. There is no retry transition.

use crate::catalog::{ToolCatalog, ToolCatalogBuilder, ToolSummary};
use crate::config::{ArgumentMode, Config};
use crate::error::{AppError, Result};
use crate::ingestion::SchemaFetcher;
use crate::proxy::{translate, DownstreamResponse, ProxyExecutor, TransportContext};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InvocationResult {
    /// The downstream answered. Any HTTP status, 4xx/5xx included.
    Completed(DownstreamResponse),
    /// The proxy could not complete the call.
    Failed(InvocationFailure),
}

impl InvocationResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, InvocationResult::Completed(_))
    }

    pub fn failure_kind(&self) -> Option<&str> {
        match self {
            InvocationResult::Failed(failure) => Some(failure.kind),
            InvocationResult::Completed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationFailure {
    /// Snake-case error kind, e.g. `missing_required_parameter`.
    pub kind: &'static str,
    pub message: String,
}

impl From<AppError> for InvocationFailure {
    fn from(err: AppError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Received,
    Translating,
    TranslationFailed,
    Dispatched,
    Completed,
    TimedOut,
    ConnectionFailed,
    InvalidResponse,
}

impl InvocationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationState::Received => "received",
            InvocationState::Translating => "translating",
            InvocationState::TranslationFailed => "translation_failed",
            InvocationState::Dispatched => "dispatched",
            InvocationState::Completed => "completed",
            InvocationState::TimedOut => "timed_out",
            InvocationState::ConnectionFailed => "connection_failed",
            InvocationState::InvalidResponse => "invalid_response",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            InvocationState::Received | InvocationState::Translating | InvocationState::Dispatched
        )
    }

    fn for_error(err: &AppError) -> Self {
        match err {
            AppError::DownstreamTimeout { .. } => InvocationState::TimedOut,
            AppError::ConnectionFailed(_) | AppError::UnreachableService(_) => {
                InvocationState::ConnectionFailed
            }
            e if e.is_translation_error() => InvocationState::TranslationFailed,
            _ => InvocationState::InvalidResponse,
        }
    }
}

/// Summary of a successful catalog reload.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadOutcome {
    pub tools: usize,
    pub fingerprint: String,
    pub changed: bool,
}

pub struct ToolRegistry {
    fetcher: SchemaFetcher,
    builder: ToolCatalogBuilder,
    executor: ProxyExecutor,
    upstream_url: Url,
    /// Replaced wholesale on reload; readers clone the `Arc` and never see a partial catalog.
    catalog: RwLock<Arc<ToolCatalog>>,
    reload_lock: tokio::sync::Mutex<()>,
    argument_mode: ArgumentMode,
    request_timeout: Duration,
}

impl ToolRegistry {
    /// Fetch the schema and build the catalog. Any error here is fatal to startup.
    pub async fn initialize(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mcproxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        let fetcher = SchemaFetcher::new(
            client.clone(),
            config.schema_path.clone(),
            config.schema_timeout,
        );
        let builder = ToolCatalogBuilder::new()
            .with_filter(config.filter.clone())
            .describe_response_schema(config.describe_response_schema);

        let description = fetcher.fetch(&config.upstream_url).await?;
        let catalog = builder.build(description)?;
        metrics::gauge!("mcp_catalog_tools").set(catalog.len() as f64);

        Ok(Self {
            fetcher,
            builder,
            executor: ProxyExecutor::new(client, config.upstream_url.clone()),
            upstream_url: config.upstream_url.clone(),
            catalog: RwLock::new(Arc::new(catalog)),
            reload_lock: tokio::sync::Mutex::new(()),
            argument_mode: config.argument_mode,
            request_timeout: config.request_timeout,
        })
    }

    /// Snapshot of the current catalog.
    pub fn catalog(&self) -> Arc<ToolCatalog> {
        let guard = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Tools in catalog order.
    pub fn list_tools(&self) -> Vec<ToolSummary> {
        self.catalog().iter().map(|tool| tool.summary()).collect()
    }

    /// Invoke a tool. Never returns an error: every failure is folded into
    /// [`InvocationResult::Failed`].
    pub async fn call_tool(
        &self,
        name: &str,
        args: &Value,
        context: &TransportContext,
    ) -> InvocationResult {
        let span = tracing::info_span!("invocation", id = %Uuid::new_v4(), tool = %name);
        self.run_invocation(name, args, context)
            .instrument(span)
            .await
    }

    async fn run_invocation(
        &self,
        name: &str,
        args: &Value,
        context: &TransportContext,
    ) -> InvocationResult {
        let start = Instant::now();
        let mut state = InvocationState::Received;
        tracing::debug!(state = state.as_str(), "Invocation received");

        let catalog = self.catalog();
        let Some(tool) = catalog.get(name) else {
            let err = AppError::UnknownTool {
                name: name.to_string(),
            };
            return finish(name, InvocationState::TranslationFailed, start, Err(err));
        };

        advance(&mut state, InvocationState::Translating);
        let request = match translate(tool, args, context, self.argument_mode) {
            Ok(request) => request,
            Err(err) => return finish(name, InvocationState::TranslationFailed, start, Err(err)),
        };

        advance(&mut state, InvocationState::Dispatched);
        tracing::debug!(method = %request.method, path = %request.path, "Dispatching downstream");
        match self.executor.execute(request, self.request_timeout).await {
            Ok(response) => finish(name, InvocationState::Completed, start, Ok(response)),
            Err(err) => {
                let terminal = InvocationState::for_error(&err);
                finish(name, terminal, start, Err(err))
            }
        }
    }

    /// Re-fetch the schema and swap in a new catalog. On failure the current
    /// catalog keeps serving and the error is returned.
    pub async fn reload(&self) -> Result<ReloadOutcome> {
        let _guard = self.reload_lock.lock().await;
        let previous = self.catalog();

        let rebuilt = match self.fetcher.fetch(&self.upstream_url).await {
            Ok(description) => self.builder.build(description),
            Err(err) => Err(err),
        };
        let catalog = match rebuilt {
            Ok(catalog) => catalog,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    tools = previous.len(),
                    "Catalog reload failed; keeping previous catalog"
                );
                metrics::counter!("mcp_catalog_reloads_total", "outcome" => "failed").increment(1);
                return Err(err);
            }
        };

        let outcome = ReloadOutcome {
            tools: catalog.len(),
            fingerprint: catalog.fingerprint().to_string(),
            changed: catalog.fingerprint() != previous.fingerprint(),
        };

        {
            let mut slot = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
            *slot = Arc::new(catalog);
        }

        metrics::counter!("mcp_catalog_reloads_total", "outcome" => "succeeded").increment(1);
        metrics::gauge!("mcp_catalog_tools").set(outcome.tools as f64);
        tracing::info!(
            tools = outcome.tools,
            changed = outcome.changed,
            "Catalog reloaded"
        );
        Ok(outcome)
    }
}

fn advance(state: &mut InvocationState, next: InvocationState) {
    tracing::trace!(from = state.as_str(), to = next.as_str(), "Invocation state");
    *state = next;
}

fn finish(
    tool: &str,
    state: InvocationState,
    start: Instant,
    outcome: Result<DownstreamResponse>,
) -> InvocationResult {
    let elapsed = start.elapsed();
    metrics::counter!("mcp_tool_calls_total", "outcome" => state.as_str()).increment(1);
    metrics::histogram!("mcp_tool_call_duration_seconds").record(elapsed.as_secs_f64());

    match outcome {
        Ok(response) => {
            tracing::info!(
                state = state.as_str(),
                status = response.status,
                elapsed_ms = elapsed.as_millis() as u64,
                "Invocation completed"
            );
            InvocationResult::Completed(response)
        }
        Err(err) => {
            if err.is_translation_error() {
                tracing::warn!(state = state.as_str(), tool, error = %err, "Invocation rejected");
            } else {
                tracing::error!(
                    state = state.as_str(),
                    tool,
                    error = %err,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Invocation failed"
                );
            }
            InvocationResult::Failed(err.into())
        }
    }
}
