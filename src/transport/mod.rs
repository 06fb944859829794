//! Network boundary used by the session manager.
//!
//! The manager never opens sockets itself; every authentication, validation,
//! keep-alive and delegation call goes through an [`AuthTransport`].

mod envelope;
mod http;
#[cfg(any(test, feature = "test-util"))]
mod mock;

pub use envelope::{ApiError, ApiErrorType, Envelope, ResponseStatus};
pub use http::HttpTransport;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockReply, MockTransport};

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;

/// Header carrying the caller identity on every call.
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";

/// Header carrying the raw session token on authenticated calls.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// HTTP method of a transport request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// Where a request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A path on a tenant host, e.g. `("acme.example.com", "/api/v25.1/auth")`.
    Tenant { host: String, path: String },
    /// A fully-qualified URL outside the tenant (identity-provider token endpoints).
    Absolute(String),
}

impl Endpoint {
    /// Path component used for routing and logging.
    pub fn path(&self) -> &str {
        match self {
            Endpoint::Tenant { path, .. } => path,
            Endpoint::Absolute(url) => url,
        }
    }
}

/// A single outbound call.
#[derive(Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub endpoint: Endpoint,
    pub headers: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl TransportRequest {
    pub fn new(method: Method, endpoint: Endpoint) -> Self {
        Self {
            method,
            endpoint,
            headers: Vec::new(),
            form: Vec::new(),
        }
    }

    pub fn get(host: &str, path: impl Into<String>) -> Self {
        Self::new(Method::Get, tenant(host, path))
    }

    pub fn post(host: &str, path: impl Into<String>) -> Self {
        Self::new(Method::Post, tenant(host, path))
    }

    pub fn delete(host: &str, path: impl Into<String>) -> Self {
        Self::new(Method::Delete, tenant(host, path))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    /// Looks up a header by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Looks up a form field by name.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

// Form bodies and auth headers carry secrets; only the shape is printed.
impl Debug for TransportRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        let form_names: Vec<&str> = self.form.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("endpoint", &self.endpoint)
            .field("headers", &header_names)
            .field("form", &form_names)
            .finish()
    }
}

fn tenant(host: &str, path: impl Into<String>) -> Endpoint {
    Endpoint::Tenant {
        host: host.to_string(),
        path: path.into(),
    }
}

/// Raw response handed back by the transport.
///
/// `json` is `Value::Null` when the body was empty or not JSON.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub json: Value,
}

impl TransportResponse {
    pub fn new(status: u16, json: Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            json,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Failure below the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport I/O failed: {0}")]
    Io(String),
}

/// Network collaborator consumed by the session manager.
#[async_trait]
pub trait AuthTransport: Send + Sync + Debug {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
