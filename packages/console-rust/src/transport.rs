//! HTTP transport seam.
//!
//! Everything above this module talks to the management API through the
//! [`Transport`] trait; [`ReqwestTransport`] is the production implementation.

use async_trait::async_trait;
use fleet_core::DispatchFailure;
use http::{HeaderMap, HeaderValue, Method};
use serde_json::Value;

use crate::config::{ConsoleConfig, Credentials};

/// Errors returned by a [`Transport`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("Request failed with status code {status}")]
    Http { status: u16, body: Option<Value> },
    /// No response was received (connect, TLS, timeout).
    #[error("network error: {0}")]
    Network(String),
    /// A 2xx response whose body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(String),
    /// The request could not be built.
    #[error("invalid request: {0}")]
    Request(String),
}

impl From<TransportError> for DispatchFailure {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Http { status, ref body } => DispatchFailure::Http {
                status,
                message: err.to_string(),
                body: body.clone(),
            },
            TransportError::Network(_) => DispatchFailure::Network {
                message: err.to_string(),
            },
            TransportError::Decode(_) | TransportError::Request(_) => {
                DispatchFailure::Other(anyhow::Error::new(err))
            }
        }
    }
}

/// A single JSON request against the management API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the configured base URL (may carry a query string).
    pub path: String,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Sends JSON requests and returns parsed JSON bodies.
///
/// Implementations must map non-2xx responses to `TransportError::Http`, and
/// return `Value::Null` for empty 2xx bodies.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError>;
}

// ---------------------------------------------------------------------------
// ReqwestTransport
// ---------------------------------------------------------------------------

/// `reqwest`-backed transport with base URL, credentials and timeout applied.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: String,
    client: reqwest::Client,
    credentials: Credentials,
}

impl ReqwestTransport {
    /// Builds a transport from the console configuration.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Request` if the HTTP client cannot be built.
    pub fn new(config: &ConsoleConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            credentials: config.credentials.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let mut builder = self
            .client
            .request(request.method, self.url(&request.path))
            .headers(request.headers);
        builder = match &self.credentials {
            Credentials::None => builder,
            Credentials::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Credentials::Bearer(token) => builder.bearer_auth(token),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Network(format!("request timed out: {e}"))
            } else {
                TransportError::Network(e.to_string())
            }
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "request succeeded");
            parse_body(&text).map_err(|e| TransportError::Decode(e.to_string()))
        } else {
            tracing::debug!(status = status.as_u16(), "request rejected");
            let body = if text.trim().is_empty() {
                None
            } else {
                Some(parse_body(&text).unwrap_or(Value::String(text)))
            };
            Err(TransportError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }
}

fn parse_body(text: &str) -> Result<Value, serde_json::Error> {
    if text.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str(text)
    }
}
