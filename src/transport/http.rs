//! reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{AuthTransport, Endpoint, Method, TransportError, TransportRequest, TransportResponse};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("tenant-session/", env!("CARGO_PKG_VERSION"));

/// Sends requests over HTTPS with a shared connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    scheme: &'static str,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(Self::with_http(http))
    }

    /// Reuse an existing reqwest client (proxy, TLS roots, pool settings).
    pub fn with_http(http: reqwest::Client) -> Self {
        Self {
            http,
            scheme: "https",
        }
    }

    /// Talk plain HTTP to tenant hosts. Intended for local test servers.
    pub fn insecure(mut self) -> Self {
        self.scheme = "http";
        self
    }

    fn url(&self, endpoint: &Endpoint) -> String {
        match endpoint {
            Endpoint::Tenant { host, path } => format!("{}://{}{}", self.scheme, host, path),
            Endpoint::Absolute(url) => url.clone(),
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("scheme", &self.scheme)
            .finish()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Io(err.to_string())
    }
}

#[async_trait]
impl AuthTransport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = self.url(&request.endpoint);
        let mut builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Delete => self.http.delete(&url),
        };

        builder = builder.header("Accept", "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);

        tracing::trace!(
            method = request.method.as_str(),
            path = request.endpoint.path(),
            status,
            "transport call finished"
        );

        Ok(TransportResponse {
            status,
            headers,
            json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let transport = HttpTransport::new().unwrap();
        let url = transport.url(&Endpoint::Tenant {
            host: "acme.example.com".into(),
            path: "/api/v25.1/auth".into(),
        });
        assert_eq!(url, "https://acme.example.com/api/v25.1/auth");

        let insecure = transport.clone().insecure();
        let url = insecure.url(&Endpoint::Tenant {
            host: "127.0.0.1:8080".into(),
            path: "/api/".into(),
        });
        assert_eq!(url, "http://127.0.0.1:8080/api/");
    }

    #[test]
    fn test_absolute_endpoint_untouched() {
        let transport = HttpTransport::new().unwrap().insecure();
        let url = transport.url(&Endpoint::Absolute(
            "https://idp.example.com/oauth2/token".into(),
        ));
        assert_eq!(url, "https://idp.example.com/oauth2/token");
    }
}
