//! Dual-protocol data resolver.
//!
//! Every collection read goes to the query-graph endpoint first. If that
//! request fails, reports errors, lacks the collection, or yields a node that
//! cannot be mapped, the same collection is fetched from its resource path.
//! When both fail the caller receives an empty list; resolution never errors.
//!
//! - [`entity`]: per-entity mappers for both protocol shapes
//! - [`queries`]: collection documents and fallback paths

pub mod entity;
pub mod queries;

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::client::{ClientHandle, GraphClient, RestClient};
use crate::config::{ConsoleConfig, ResolverConfig};

pub use entity::{EntityError, HostGroup, HostSummary, ResolvedEntity, Taxonomy};
pub use queries::CollectionQuery;

// ---------------------------------------------------------------------------
// NormalizedList
// ---------------------------------------------------------------------------

/// Which protocol produced a [`NormalizedList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedVia {
    Graph,
    Rest,
    /// Both protocols failed; the list is empty.
    Unavailable,
}

impl ResolvedVia {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Rest => "rest",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ResolvedVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collection in canonical form, whichever protocol served it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedList<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub via: ResolvedVia,
}

impl<T> NormalizedList<T> {
    /// The result when neither protocol produced data.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            per_page: 0,
            via: ResolvedVia::Unavailable,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Organizations and locations available to the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionContext {
    pub organizations: NormalizedList<Taxonomy>,
    pub locations: NormalizedList<Taxonomy>,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Reason the query-graph attempt was abandoned; logged, never returned.
#[derive(Debug, thiserror::Error)]
enum GraphAttemptError {
    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),
    #[error("response reported errors: {0}")]
    Reported(String),
    #[error("collection {0} missing from response")]
    MissingCollection(String),
    #[error("collection has no recognizable node list")]
    UnrecognizedShape,
    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// Resolves collections through the query-graph endpoint with a
/// resource-oriented fallback.
#[derive(Debug, Clone)]
pub struct Resolver {
    graph: GraphClient,
    rest: RestClient,
    config: ResolverConfig,
}

impl Resolver {
    #[must_use]
    pub fn new(client: ClientHandle, graphql_path: &str, config: ResolverConfig) -> Self {
        Self {
            graph: GraphClient::new(client.clone(), graphql_path),
            rest: RestClient::new(client),
            config,
        }
    }

    #[must_use]
    pub fn from_config(client: ClientHandle, config: &ConsoleConfig) -> Self {
        Self::new(client, &config.graphql_path, config.resolver.clone())
    }

    /// Fetches `query`'s collection, preferring the query-graph protocol.
    ///
    /// Never fails: if both protocols fail the result is
    /// [`NormalizedList::empty`] with `via == ResolvedVia::Unavailable`.
    pub async fn resolve<T: ResolvedEntity>(&self, query: &CollectionQuery) -> NormalizedList<T> {
        let list = match self.try_graph(query).await {
            Ok(list) => list,
            Err(graph_error) => {
                tracing::warn!(
                    collection = query.name,
                    error = %graph_error,
                    "query-graph fetch failed, falling back to resource path"
                );
                match self.try_rest(query).await {
                    Ok(list) => list,
                    Err(rest_error) => {
                        tracing::warn!(
                            collection = query.name,
                            path = %query.fallback_path,
                            error = %rest_error,
                            "resource fallback failed, returning empty collection"
                        );
                        NormalizedList::empty()
                    }
                }
            }
        };

        metrics::counter!(
            "fleet_resolver_requests_total",
            "collection" => query.name,
            "via" => list.via.as_str()
        )
        .increment(1);
        tracing::debug!(
            collection = query.name,
            via = %list.via,
            count = list.len(),
            "collection resolved"
        );
        list
    }

    async fn try_graph<T: ResolvedEntity>(
        &self,
        query: &CollectionQuery,
    ) -> Result<NormalizedList<T>, GraphAttemptError> {
        let envelope = self
            .graph
            .query(query.document, query.variables.as_ref())
            .await?;
        if envelope.has_errors() {
            let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(GraphAttemptError::Reported(messages.join("; ")));
        }
        let collection = envelope
            .field(&query.collection)
            .ok_or_else(|| GraphAttemptError::MissingCollection(query.collection.join(".")))?;

        let nodes = graph_nodes(collection).ok_or(GraphAttemptError::UnrecognizedShape)?;
        let items = nodes
            .into_iter()
            .map(T::from_graph_node)
            .collect::<Result<Vec<_>, _>>()?;

        let len = items.len() as u64;
        Ok(NormalizedList {
            total: collection
                .get("totalCount")
                .and_then(Value::as_u64)
                .unwrap_or(len),
            page: 1,
            per_page: len,
            items,
            via: ResolvedVia::Graph,
        })
    }

    async fn try_rest<T: ResolvedEntity>(
        &self,
        query: &CollectionQuery,
    ) -> Result<NormalizedList<T>, anyhow::Error> {
        let page = self
            .rest
            .list(&query.fallback_path, 1, self.config.per_page)
            .await?;
        let items = page
            .results
            .iter()
            .map(T::from_rest_record)
            .collect::<Result<Vec<_>, _>>()?;

        let len = items.len() as u64;
        Ok(NormalizedList {
            total: page.total.unwrap_or(len),
            page: page.page.unwrap_or(1),
            per_page: page.per_page.unwrap_or(u64::from(self.config.per_page)),
            items,
            via: ResolvedVia::Rest,
        })
    }

    /// Organizations, all visible to the caller.
    pub async fn organizations(&self) -> NormalizedList<Taxonomy> {
        self.resolve(&CollectionQuery::organizations()).await
    }

    /// Locations, all visible to the caller.
    pub async fn locations(&self) -> NormalizedList<Taxonomy> {
        self.resolve(&CollectionQuery::locations()).await
    }

    pub async fn host_groups(&self) -> NormalizedList<HostGroup> {
        self.resolve(&CollectionQuery::host_groups()).await
    }

    pub async fn hosts(&self, search: Option<&str>) -> NormalizedList<HostSummary> {
        self.resolve(&CollectionQuery::hosts(search)).await
    }

    /// The signed-in user's organizations and locations.
    pub async fn current_session(&self) -> SessionContext {
        let organizations = self
            .resolve(&CollectionQuery::current_user_organizations())
            .await;
        let locations = self
            .resolve(&CollectionQuery::current_user_locations())
            .await;
        SessionContext {
            organizations,
            locations,
        }
    }
}

/// Accepts `{edges: [{node}]}`, `{nodes: [..]}` or a bare array.
fn graph_nodes(collection: &Value) -> Option<Vec<&Value>> {
    if let Some(array) = collection.as_array() {
        return Some(array.iter().collect());
    }
    if let Some(edges) = collection.get("edges").and_then(Value::as_array) {
        return edges.iter().map(|edge| edge.get("node")).collect();
    }
    collection
        .get("nodes")
        .and_then(Value::as_array)
        .map(|nodes| nodes.iter().collect())
}

#[cfg(test)]
mod tests {
    use fleet_core::{codec, DomainId};
    use serde_json::json;

    use super::*;
    use crate::client::testing::{handle, ScriptedTransport};
    use crate::transport::TransportError;

    const GRAPHQL: &str = "/api/graphql";

    fn resolver(transport: &std::sync::Arc<ScriptedTransport>) -> Resolver {
        Resolver::new(handle(transport), GRAPHQL, ResolverConfig { per_page: 50 })
    }

    fn org_node(raw: i64, name: &str) -> Value {
        let id = DomainId::from_raw(raw).unwrap();
        json!({"id": codec::encode("Organization", id), "name": name})
    }

    #[tokio::test]
    async fn graph_edges_are_normalized() {
        let transport = ScriptedTransport::new();
        transport.respond(
            GRAPHQL,
            Ok(json!({"data": {"organizations": {
                "totalCount": 7,
                "edges": [{"node": org_node(1, "a")}, {"node": org_node(2, "b")}]
            }}})),
        );

        let list = resolver(&transport).organizations().await;
        assert_eq!(list.via, ResolvedVia::Graph);
        assert_eq!(list.total, 7);
        let ids: Vec<u64> = list.items.iter().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn graph_transport_failure_falls_back_to_rest() {
        let transport = ScriptedTransport::new();
        transport.respond(GRAPHQL, Err(TransportError::Network("refused".to_string())));
        transport.respond(
            "/api/v2/organizations",
            Ok(json!({"total": 1, "page": 1, "per_page": 50, "results": [{"id": 1, "name": "a"}]})),
        );

        let list = resolver(&transport).organizations().await;
        assert_eq!(list.via, ResolvedVia::Rest);
        assert_eq!(list.len(), 1);
        assert_eq!(list.items[0].id.get(), 1);
        assert_eq!(list.items[0].name, "a");
        assert_eq!(
            transport.paths(),
            vec![GRAPHQL, "/api/v2/organizations?page=1&per_page=50"]
        );
    }

    #[tokio::test]
    async fn reported_graph_errors_trigger_fallback() {
        let transport = ScriptedTransport::new();
        transport.respond(
            GRAPHQL,
            Ok(json!({"data": null, "errors": [{"message": "not authorized"}]})),
        );
        transport.respond("/api/v2/locations", Ok(json!([{"id": 4, "name": "lab"}])));

        let list = resolver(&transport).locations().await;
        assert_eq!(list.via, ResolvedVia::Rest);
        assert_eq!(list.items[0].id.get(), 4);
    }

    #[tokio::test]
    async fn undecodable_global_id_triggers_fallback_not_partial_list() {
        let transport = ScriptedTransport::new();
        transport.respond(
            GRAPHQL,
            Ok(json!({"data": {"organizations": {"edges": [
                {"node": org_node(1, "a")},
                {"node": {"id": "not-base64!", "name": "b"}}
            ]}}})),
        );
        transport.respond(
            "/api/v2/organizations",
            Ok(json!({"results": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]})),
        );

        let list = resolver(&transport).organizations().await;
        assert_eq!(list.via, ResolvedVia::Rest);
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn both_protocols_failing_yields_empty_list() {
        let transport = ScriptedTransport::new();
        transport.respond(GRAPHQL, Err(TransportError::Network("down".to_string())));
        transport.respond(
            "/api/v2/hostgroups",
            Err(TransportError::Http {
                status: 500,
                body: None,
            }),
        );

        let list = resolver(&transport).host_groups().await;
        assert!(list.is_empty());
        assert_eq!(list.via, ResolvedVia::Unavailable);
        assert_eq!(list.total, 0);
    }

    #[tokio::test]
    async fn current_session_reads_nested_collections() {
        let transport = ScriptedTransport::new();
        transport.respond(
            GRAPHQL,
            Ok(json!({"data": {"currentUser": {"organizations": {"nodes": [org_node(3, "c")]}}}})),
        );
        transport.respond(
            GRAPHQL,
            Ok(json!({"data": {"currentUser": {"locations": {"nodes": []}}}})),
        );

        let session = resolver(&transport).current_session().await;
        assert_eq!(session.organizations.via, ResolvedVia::Graph);
        assert_eq!(session.organizations.items[0].id.get(), 3);
        assert_eq!(session.locations.via, ResolvedVia::Graph);
        assert!(session.locations.is_empty());
    }

    #[tokio::test]
    async fn missing_collection_falls_back() {
        let transport = ScriptedTransport::new();
        transport.respond(GRAPHQL, Ok(json!({"data": {"currentUser": null}})));
        transport.respond(
            "/api/v2/current_user/organizations",
            Ok(json!({"results": [{"id": 9, "name": "z"}]})),
        );
        transport.respond(GRAPHQL, Ok(json!({"data": {"currentUser": {"locations": []}}})));

        let session = resolver(&transport).current_session().await;
        assert_eq!(session.organizations.via, ResolvedVia::Rest);
        assert_eq!(session.organizations.items[0].id.get(), 9);
    }

    #[test]
    fn graph_nodes_rejects_unknown_shapes() {
        assert!(graph_nodes(&json!({"count": 1})).is_none());
        assert!(graph_nodes(&json!({"edges": [{"cursor": "a"}]})).is_none());
        assert_eq!(graph_nodes(&json!([1, 2])).map(|n| n.len()), Some(2));
    }
}
