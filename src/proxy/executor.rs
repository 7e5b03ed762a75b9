use crate::error::{AppError, Result};
use crate::proxy::translator::{DownstreamRequest, RequestBody};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

/// What the downstream service answered, relayed without interpretation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownstreamResponse {
    pub status: u16,
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Parsed JSON for JSON content types, otherwise the body text.
    pub body: Value,
}

impl DownstreamResponse {
    /// Body as the text handed back to the agent.
    pub fn body_text(&self) -> String {
        match &self.body {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Performs downstream calls. One attempt per invocation; any HTTP status
/// counts as a completed call.
#[derive(Clone)]
pub struct ProxyExecutor {
    client: reqwest::Client,
    base_url: Url,
}

impl ProxyExecutor {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Absolute URL for a translated request, query string included.
    pub fn url_for(&self, request: &DownstreamRequest) -> Result<Url> {
        let joined = format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            request.path
        );
        let mut url = Url::parse(&joined).map_err(|e| AppError::InvalidArgument {
            name: "path".to_string(),
            reason: e.to_string(),
        })?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }

    /// Issue the call, bounded by `timeout` for the whole exchange (headers and body).
    ///
    /// # Errors
    /// * `DownstreamTimeout` when `timeout` elapses
    /// * `ConnectionFailed` when the request cannot be sent
    /// * `InvalidResponse` when the response body cannot be read
    pub async fn execute(
        &self,
        request: DownstreamRequest,
        timeout: Duration,
    ) -> Result<DownstreamResponse> {
        let url = self.url_for(&request)?;
        let start = Instant::now();

        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .headers(request.headers);
        builder = match request.body {
            Some(RequestBody::Json(payload)) => builder.json(&payload),
            Some(RequestBody::Form(pairs)) => builder.form(&pairs),
            None => builder,
        };

        let exchange = async {
            let response = builder.send().await.map_err(|e| send_error(e, timeout))?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let bytes = response
                .bytes()
                .await
                .map_err(|e| AppError::InvalidResponse(e.to_string()))?;
            Ok::<_, AppError>((status, content_type, bytes))
        };

        let (status, content_type, bytes) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| AppError::DownstreamTimeout {
                timeout_ms: timeout.as_millis() as u64,
            })??;

        tracing::debug!(
            method = %request.method,
            url = %url,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Downstream call completed"
        );

        Ok(DownstreamResponse {
            status,
            body: decode_body(content_type.as_deref(), &bytes),
            content_type,
        })
    }
}

fn send_error(err: reqwest::Error, timeout: Duration) -> AppError {
    if err.is_timeout() {
        AppError::DownstreamTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if err.is_connect() || err.is_request() {
        AppError::ConnectionFailed(err.to_string())
    } else {
        AppError::InvalidResponse(err.to_string())
    }
}

/// JSON content types are relayed as parsed JSON, falling back to text when
/// the body does not parse.
fn decode_body(content_type: Option<&str>, bytes: &[u8]) -> Value {
    let is_json = content_type
        .map(|ct| {
            let essence = ct.split(';').next().unwrap_or("").trim();
            essence == "application/json" || essence.ends_with("+json")
        })
        .unwrap_or(false);

    if is_json {
        if let Ok(value) = serde_json::from_slice(bytes) {
            return value;
        }
    }
    Value::String(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use reqwest::Method;
    use serde_json::json;

    fn request(path: &str, query: Vec<(&str, &str)>) -> DownstreamRequest {
        DownstreamRequest {
            method: Method::GET,
            path: path.to_string(),
            query: query
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[test]
    fn test_url_for_joins_base_and_query() {
        let executor = ProxyExecutor::new(
            reqwest::Client::new(),
            Url::parse("http://api.local:6673/v2/").unwrap(),
        );

        let url = executor
            .url_for(&request("/items/42", vec![("tag", "a b"), ("tag", "c")]))
            .unwrap();
        assert_eq!(url.as_str(), "http://api.local:6673/v2/items/42?tag=a+b&tag=c");
    }

    #[test]
    fn test_decode_json_body() {
        let body = decode_body(Some("application/json; charset=utf-8"), br#"{"detail":"x"}"#);
        assert_eq!(body, json!({ "detail": "x" }));
    }

    #[test]
    fn test_decode_invalid_json_falls_back_to_text() {
        let body = decode_body(Some("application/json"), b"not json");
        assert_eq!(body, json!("not json"));
    }

    #[test]
    fn test_decode_text_body() {
        let body = decode_body(Some("text/plain"), b"{\"a\":1}");
        assert_eq!(body, json!("{\"a\":1}"));
        assert_eq!(decode_body(None, b"plain"), json!("plain"));
    }

    #[test]
    fn test_body_text() {
        let text = DownstreamResponse {
            status: 500,
            content_type: None,
            body: json!("boom"),
        };
        assert_eq!(text.body_text(), "boom");

        let json_body = DownstreamResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: json!({ "id": "42" }),
        };
        assert_eq!(json_body.body_text(), r#"{"id":"42"}"#);
    }
}
