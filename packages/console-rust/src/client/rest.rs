//! Resource-oriented (REST-style) protocol client.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::ClientHandle;
use crate::transport::TransportError;

/// Paginated list envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default, deserialize_with = "lenient_count")]
    pub total: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub subtotal: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub page: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub per_page: Option<u64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wraps a bare array response as a single complete page.
    #[must_use]
    pub fn from_results(results: Vec<T>) -> Self {
        let len = results.len() as u64;
        Self {
            total: Some(len),
            subtotal: Some(len),
            page: Some(1),
            per_page: Some(len),
            results,
        }
    }
}

/// Accepts numbers and numeric strings; anything else (e.g. `"all"`) is `None`.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Appends percent-encoded `key=value` pairs to `path`, extending an existing
/// query string when there is one.
pub(crate) fn with_query(path: &str, pairs: &[(&str, &str)]) -> String {
    let mut url = String::from(path);
    let mut separator = if path.contains('?') { '&' } else { '?' };
    for (key, value) in pairs {
        url.push(separator);
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(value));
        separator = '&';
    }
    url
}

/// Issues list/get requests against conventional resource paths.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: ClientHandle,
}

impl RestClient {
    #[must_use]
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }

    /// Fetches one page of a collection.
    ///
    /// # Errors
    ///
    /// Transport failures, and `TransportError::Decode` if the body is neither
    /// a paginated envelope nor a bare array.
    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        path: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Value>, TransportError> {
        let url = with_query(
            path,
            &[("page", &page.to_string()), ("per_page", &per_page.to_string())],
        );
        match self.client.current().get(&url).await? {
            Value::Array(results) => Ok(Page::from_results(results)),
            raw @ Value::Object(_) => {
                serde_json::from_value(raw).map_err(|e| TransportError::Decode(e.to_string()))
            }
            _ => Err(TransportError::Decode(
                "list response is neither an envelope nor an array".to_string(),
            )),
        }
    }

    /// Fetches a single resource.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, path: &str) -> Result<Value, TransportError> {
        self.client.current().get(path).await
    }
}
