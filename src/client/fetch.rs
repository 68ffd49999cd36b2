//! The Fetch capability
//!
//! Everything above the HTTP layer talks to the backend through this trait:
//! method, relative path, query params and an optional JSON body in, parsed
//! JSON out. Tests substitute scripted implementations.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::error::{FetchError, FetchResult};

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Patch => write!(f, "PATCH"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// A request against the backend REST root
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub method: Method,
    /// Path relative to the REST root, e.g. `client/persons/`
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl FetchRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// Builder method: add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Builder method: attach a JSON body
    pub fn json<T: Serialize>(mut self, body: &T) -> FetchResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Value of a query parameter, if present
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Opaque request execution capability
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Execute a request and return the parsed JSON body
    async fn fetch(&self, request: FetchRequest) -> FetchResult<Value>;
}

/// Execute a request and deserialize the body into `T`
pub async fn fetch_json<T: DeserializeOwned>(
    fetch: &dyn Fetch,
    request: FetchRequest,
) -> FetchResult<T> {
    let value = fetch.fetch(request).await?;
    serde_json::from_value(value).map_err(FetchError::from)
}
