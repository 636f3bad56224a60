//! Query-graph protocol client.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use super::ClientHandle;
use crate::transport::TransportError;

/// One entry of a query-graph `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphError {
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: Vec<Value>,
}

/// Parsed query-graph response: optional `data` and a possibly-empty `errors` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphEnvelope {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<GraphError>,
}

impl GraphEnvelope {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Walks `data` along `path`, e.g. `["currentUser", "organizations"]`.
    #[must_use]
    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(self.data.as_ref()?, |value, segment| value.get(*segment))
            .filter(|value| !value.is_null())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Issues query-graph documents against a single endpoint.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: ClientHandle,
    path: String,
}

impl GraphClient {
    #[must_use]
    pub fn new(client: ClientHandle, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }

    /// Sends `{query, variables?}` and parses the envelope.
    ///
    /// Errors reported inside the envelope are returned as data, not as `Err`.
    ///
    /// # Errors
    ///
    /// Transport failures, and `TransportError::Decode` if the body is not an envelope.
    #[tracing::instrument(skip(self, document, variables), fields(path = %self.path))]
    pub async fn query(
        &self,
        document: &str,
        variables: Option<&Value>,
    ) -> Result<GraphEnvelope, TransportError> {
        let mut body = json!({ "query": document });
        if let Some(variables) = variables {
            body["variables"] = variables.clone();
        }
        let raw = self.client.current().post(&self.path, body).await?;
        if !raw.is_object() {
            return Err(TransportError::Decode(
                "query-graph response is not an object".to_string(),
            ));
        }
        serde_json::from_value(raw).map_err(|e| TransportError::Decode(e.to_string()))
    }
}
