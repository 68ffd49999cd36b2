//! Backend REST Client
//!
//! reqwest implementation of the `Fetch` capability. Resolves paths against
//! `{base_url}/api/`, attaches the organization key and bearer token, and maps
//! transport and status failures onto `FetchError`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::error::{FetchError, FetchResult};
use super::fetch::{Fetch, FetchRequest, Method};
use crate::config::ApiConfig;

/// HTTP client for the backend REST API
pub struct HttpClient {
    client: Client,
    api_root: String,
    organization_key: Option<String>,
    auth_token: Option<String>,
}

impl HttpClient {
    /// Create a client from the API configuration
    pub fn new(config: &ApiConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FetchError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_root: format!("{}/api", config.base_url.trim_end_matches('/')),
            organization_key: config.organization_key.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    /// Absolute URL for a path relative to the REST root
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_root, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Fetch for HttpClient {
    async fn fetch(&self, request: FetchRequest) -> FetchResult<Value> {
        let url = self.url(&request.path);

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        };

        let mut params = request.params;
        if let Some(key) = &self.organization_key {
            params.push(("organization_key".to_string(), key.clone()));
        }
        if !params.is_empty() {
            builder = builder.query(&params);
        }
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %request.method, url = %url, "Sending request");

        let response = builder.send().await.map_err(FetchError::from)?;
        let status = response.status();
        let text = response.text().await.map_err(FetchError::from)?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), url = %url, "Request rejected");
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(FetchError::from)
    }
}

/// Extract a readable message from an error body
///
/// The backend answers `{"error": "..."}` for most failures and a map of
/// field errors for validation failures.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("error").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => Value::Object(map).to_string(),
        },
        _ => body.trim().to_string(),
    }
}
