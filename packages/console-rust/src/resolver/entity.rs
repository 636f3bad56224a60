//! Per-entity mappers from both protocol shapes into canonical domain types.

use fleet_core::{codec, DomainId, ValidationError};
use serde::Serialize;
use serde_json::Value;

/// Timestamp reported for fields the query-graph schema does not expose.
pub const UNKNOWN_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

/// Reasons a single node or record cannot be mapped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntityError {
    #[error(transparent)]
    InvalidId(#[from] ValidationError),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for field: {0}")]
    InvalidField(&'static str),
}

/// A domain type that can be built from either protocol's shape.
pub trait ResolvedEntity: Sized + Send {
    /// Maps a query-graph node (global ids, sparse fields).
    ///
    /// # Errors
    ///
    /// Returns an `EntityError` if the node lacks an id or name, or its id cannot be decoded.
    fn from_graph_node(node: &Value) -> Result<Self, EntityError>;

    /// Maps a resource-oriented record (numeric ids, full fields).
    ///
    /// # Errors
    ///
    /// Returns an `EntityError` if the record lacks an id or name.
    fn from_rest_record(record: &Value) -> Result<Self, EntityError>;
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn graph_id(node: &Value) -> Result<DomainId, EntityError> {
    let raw = node
        .get("id")
        .and_then(Value::as_str)
        .ok_or(EntityError::MissingField("id"))?;
    Ok(codec::decode(raw)?)
}

fn rest_id(record: &Value, key: &'static str) -> Result<DomainId, EntityError> {
    let value = record.get(key).ok_or(EntityError::MissingField(key))?;
    numeric_id(value).ok_or_else(|| match value.as_i64() {
        Some(id) => EntityError::InvalidId(ValidationError::InvalidTargetId { id }),
        None => EntityError::InvalidField(key),
    })
}

fn numeric_id(value: &Value) -> Option<DomainId> {
    match value {
        Value::Number(n) => n.as_i64().and_then(DomainId::from_raw),
        Value::String(s) => s.trim().parse().ok().and_then(DomainId::from_raw),
        _ => None,
    }
}

/// Optional reference to another entity: `{"organization": {"id": "<global>"}}`
/// on graph nodes, `{"organization_id": 3}` on records.
fn graph_ref(node: &Value, key: &str) -> Result<Option<DomainId>, EntityError> {
    match node.get(key).and_then(|v| v.get("id")).and_then(Value::as_str) {
        Some(raw) => Ok(Some(codec::decode(raw)?)),
        None => Ok(None),
    }
}

fn rest_ref(record: &Value, key: &str) -> Option<DomainId> {
    record.get(key).and_then(numeric_id)
}

fn string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn required_string(value: &Value, key: &'static str) -> Result<String, EntityError> {
    string(value, key).ok_or(EntityError::MissingField(key))
}

fn count(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn timestamp(value: &Value, key: &str) -> String {
    string(value, key).unwrap_or_else(|| UNKNOWN_TIMESTAMP.to_string())
}

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// An organization or location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Taxonomy {
    pub id: DomainId,
    pub name: String,
    /// Fully-qualified name; equals `name` for top-level taxonomies.
    pub title: String,
    pub description: String,
    pub hosts_count: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl ResolvedEntity for Taxonomy {
    fn from_graph_node(node: &Value) -> Result<Self, EntityError> {
        let id = graph_id(node)?;
        let name = required_string(node, "name")?;
        Ok(Self {
            id,
            title: string(node, "title").unwrap_or_else(|| name.clone()),
            name,
            description: String::new(),
            hosts_count: 0,
            created_at: UNKNOWN_TIMESTAMP.to_string(),
            updated_at: UNKNOWN_TIMESTAMP.to_string(),
        })
    }

    fn from_rest_record(record: &Value) -> Result<Self, EntityError> {
        let id = rest_id(record, "id")?;
        let name = required_string(record, "name")?;
        Ok(Self {
            id,
            title: string(record, "title").unwrap_or_else(|| name.clone()),
            name,
            description: string(record, "description").unwrap_or_default(),
            hosts_count: count(record, "hosts_count"),
            created_at: timestamp(record, "created_at"),
            updated_at: timestamp(record, "updated_at"),
        })
    }
}

// ---------------------------------------------------------------------------
// HostGroup
// ---------------------------------------------------------------------------

/// A host group; populates "select a host group" parameter options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostGroup {
    pub id: DomainId,
    pub name: String,
    pub title: String,
    pub description: String,
    pub hosts_count: u64,
}

impl ResolvedEntity for HostGroup {
    fn from_graph_node(node: &Value) -> Result<Self, EntityError> {
        let id = graph_id(node)?;
        let name = required_string(node, "name")?;
        Ok(Self {
            id,
            title: string(node, "title").unwrap_or_else(|| name.clone()),
            name,
            description: string(node, "description").unwrap_or_default(),
            hosts_count: 0,
        })
    }

    fn from_rest_record(record: &Value) -> Result<Self, EntityError> {
        let id = rest_id(record, "id")?;
        let name = required_string(record, "name")?;
        Ok(Self {
            id,
            title: string(record, "title").unwrap_or_else(|| name.clone()),
            name,
            description: string(record, "description").unwrap_or_default(),
            hosts_count: count(record, "hosts_count"),
        })
    }
}

// ---------------------------------------------------------------------------
// HostSummary
// ---------------------------------------------------------------------------

/// A managed host as listed for bulk target selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSummary {
    pub id: DomainId,
    pub name: String,
    pub organization_id: Option<DomainId>,
    pub location_id: Option<DomainId>,
    pub hostgroup_id: Option<DomainId>,
}

impl ResolvedEntity for HostSummary {
    fn from_graph_node(node: &Value) -> Result<Self, EntityError> {
        Ok(Self {
            id: graph_id(node)?,
            name: required_string(node, "name")?,
            organization_id: graph_ref(node, "organization")?,
            location_id: graph_ref(node, "location")?,
            hostgroup_id: graph_ref(node, "hostgroup")?,
        })
    }

    fn from_rest_record(record: &Value) -> Result<Self, EntityError> {
        Ok(Self {
            id: rest_id(record, "id")?,
            name: required_string(record, "name")?,
            organization_id: rest_ref(record, "organization_id"),
            location_id: rest_ref(record, "location_id"),
            hostgroup_id: rest_ref(record, "hostgroup_id"),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn gid(type_name: &str, raw: i64) -> String {
        codec::encode(type_name, id(raw))
    }

    fn id(raw: i64) -> DomainId {
        DomainId::from_raw(raw).unwrap()
    }

    #[test]
    fn graph_taxonomy_fills_documented_defaults() {
        let node = json!({"id": gid("Organization", 42), "name": "Engineering"});
        let org = Taxonomy::from_graph_node(&node).unwrap();
        assert_eq!(org.id, id(42));
        assert_eq!(org.title, "Engineering");
        assert_eq!(org.description, "");
        assert_eq!(org.hosts_count, 0);
        assert_eq!(org.created_at, UNKNOWN_TIMESTAMP);
        assert_eq!(org.updated_at, UNKNOWN_TIMESTAMP);
    }

    #[test]
    fn graph_taxonomy_with_bad_id_is_an_error() {
        let node = json!({"id": "%%%", "name": "x"});
        assert!(matches!(
            Taxonomy::from_graph_node(&node),
            Err(EntityError::InvalidId(ValidationError::InvalidGraphId { .. }))
        ));
        assert_eq!(
            Taxonomy::from_graph_node(&json!({"name": "x"})),
            Err(EntityError::MissingField("id"))
        );
    }

    #[test]
    fn rest_ids_report_what_was_wrong() {
        assert_eq!(
            Taxonomy::from_rest_record(&json!({"id": "abc", "name": "x"})),
            Err(EntityError::InvalidField("id"))
        );
        assert_eq!(
            Taxonomy::from_rest_record(&json!({"id": true, "name": "x"})),
            Err(EntityError::InvalidField("id"))
        );
        assert_eq!(
            Taxonomy::from_rest_record(&json!({"id": -4, "name": "x"})),
            Err(EntityError::InvalidId(ValidationError::InvalidTargetId { id: -4 }))
        );
    }

    #[test]
    fn rest_taxonomy_keeps_server_fields() {
        let record = json!({
            "id": 3, "name": "Lab", "title": "Corp/Lab", "description": null,
            "hosts_count": 12, "created_at": "2024-01-01T00:00:00Z"
        });
        let loc = Taxonomy::from_rest_record(&record).unwrap();
        assert_eq!(loc.id, id(3));
        assert_eq!(loc.title, "Corp/Lab");
        assert_eq!(loc.description, "");
        assert_eq!(loc.hosts_count, 12);
        assert_eq!(loc.created_at, "2024-01-01T00:00:00Z");
        assert_eq!(loc.updated_at, UNKNOWN_TIMESTAMP);
    }

    #[test]
    fn rest_ids_accept_numeric_strings_but_not_zero() {
        assert_eq!(
            HostGroup::from_rest_record(&json!({"id": "8", "name": "web"})).unwrap().id,
            id(8)
        );
        assert!(HostGroup::from_rest_record(&json!({"id": 0, "name": "web"})).is_err());
    }

    #[test]
    fn host_summary_references_from_both_shapes() {
        let node = json!({
            "id": gid("Host", 5), "name": "web-01.example.com",
            "organization": {"id": gid("Organization", 1)},
            "location": null
        });
        let host = HostSummary::from_graph_node(&node).unwrap();
        assert_eq!(host.organization_id, Some(id(1)));
        assert_eq!(host.location_id, None);

        let record = json!({"id": 5, "name": "web-01.example.com", "hostgroup_id": 9});
        let host = HostSummary::from_rest_record(&record).unwrap();
        assert_eq!(host.hostgroup_id, Some(id(9)));
        assert_eq!(host.organization_id, None);
    }
}
