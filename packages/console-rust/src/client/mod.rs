//! API clients and the owned client handle.
//!
//! - [`ApiClient`]: verb helpers over a [`Transport`]
//! - [`ClientHandle`]: the single, explicitly-owned slot holding the current
//!   client; replaced on credential change
//! - [`graph`]: query-graph protocol client
//! - [`rest`]: resource-oriented protocol client

pub mod graph;
pub mod rest;

use std::sync::Arc;

use arc_swap::ArcSwap;
use http::Method;
use serde_json::Value;

use crate::config::ConsoleConfig;
use crate::transport::{ApiRequest, ReqwestTransport, Transport, TransportError};

pub use graph::{GraphClient, GraphEnvelope, GraphError};
pub use rest::{Page, RestClient};

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// JSON API client bound to one transport (and therefore one set of credentials).
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Builds a `reqwest`-backed client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Request` if the HTTP client cannot be built.
    pub fn from_config(config: &ConsoleConfig) -> Result<Self, TransportError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new(config)?)))
    }

    /// Sends a request with an optional JSON body.
    ///
    /// # Errors
    ///
    /// Propagates the transport's error.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        let mut request = ApiRequest::new(method, path);
        request.body = body;
        self.transport.send(request).await
    }

    /// # Errors
    ///
    /// Propagates the transport's error.
    pub async fn get(&self, path: &str) -> Result<Value, TransportError> {
        self.request(Method::GET, path, None).await
    }

    /// # Errors
    ///
    /// Propagates the transport's error.
    pub async fn post(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// # Errors
    ///
    /// Propagates the transport's error.
    pub async fn put(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// # Errors
    ///
    /// Propagates the transport's error.
    pub async fn delete(&self, path: &str, body: Option<Value>) -> Result<Value, TransportError> {
        self.request(Method::DELETE, path, body).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ClientHandle
// ---------------------------------------------------------------------------

/// Shared handle to the current [`ApiClient`].
///
/// Cloning is cheap and every clone observes `replace`. Each call loads a
/// snapshot of the client, so a replacement never affects requests already
/// in flight. Whoever owns the credentials owns the replacement lifecycle.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    current: Arc<ArcSwap<ApiClient>>,
}

impl ClientHandle {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(client)),
        }
    }

    /// Snapshot of the client to use for one call.
    #[must_use]
    pub fn current(&self) -> Arc<ApiClient> {
        self.current.load_full()
    }

    /// Installs a new client, e.g. after login or logout.
    pub fn replace(&self, client: ApiClient) {
        tracing::debug!("api client replaced");
        self.current.store(Arc::new(client));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport used by tests across the crate.

    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;

    /// Records every request and replays scripted responses per path prefix.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: Mutex<Vec<(String, VecDeque<Result<Value, TransportError>>)>>,
        pub requests: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Queues a response for the first route whose prefix matches the request path.
        pub fn respond(&self, path_prefix: &str, response: Result<Value, TransportError>) {
            let mut routes = self.routes.lock();
            if let Some((_, queue)) = routes.iter_mut().find(|(p, _)| p == path_prefix) {
                queue.push_back(response);
            } else {
                routes.push((path_prefix.to_string(), VecDeque::from([response])));
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        pub fn paths(&self) -> Vec<String> {
            self.requests.lock().iter().map(|r| r.path.clone()).collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
            let path = request.path.clone();
            self.requests.lock().push(request);
            let mut routes = self.routes.lock();
            routes
                .iter_mut()
                .find(|(prefix, queue)| path.starts_with(prefix.as_str()) && !queue.is_empty())
                .and_then(|(_, queue)| queue.pop_front())
                .unwrap_or_else(|| Err(TransportError::Network(format!("no scripted response for {path}"))))
        }
    }

    pub fn handle(transport: &Arc<ScriptedTransport>) -> ClientHandle {
        ClientHandle::new(ApiClient::new(transport.clone()))
    }
}
