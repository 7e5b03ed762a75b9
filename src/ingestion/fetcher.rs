use crate::error::{AppError, Result};
use crate::ingestion::openapi::parse_openapi;
use crate::ingestion::types::InterfaceDescription;
use std::time::Duration;
use url::Url;

/// Retrieves the downstream service's OpenAPI document.
///
/// A single GET per call, no retries. Whether a failure aborts startup or only
/// fails a reload is decided by the caller.
#[derive(Clone)]
pub struct SchemaFetcher {
    client: reqwest::Client,
    schema_path: String,
    timeout: Duration,
}

impl SchemaFetcher {
    pub fn new(client: reqwest::Client, schema_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            schema_path: schema_path.into(),
            timeout,
        }
    }

    /// Full URL of the schema endpoint under `base_url`.
    pub fn schema_url(&self, base_url: &Url) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            base_url.as_str().trim_end_matches('/'),
            self.schema_path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| AppError::Config(format!("invalid schema URL: {}", e)))
    }

    pub async fn fetch(&self, base_url: &Url) -> Result<InterfaceDescription> {
        let url = self.schema_url(base_url)?;
        tracing::info!(url = %url, "Fetching interface schema");

        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::UnreachableService(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(url = %url, status = status.as_u16(), "Schema endpoint returned an error");
            return Err(AppError::SchemaHttpError {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::UnreachableService(format!("reading schema body: {}", e)))?;
        let document: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::InvalidSchema(format!("schema is not valid JSON: {}", e)))?;

        let description = parse_openapi(&document)?;
        tracing::info!(
            title = %description.title,
            version = %description.version,
            operations = description.operations.len(),
            "Interface schema loaded"
        );
        Ok(description)
    }
}
