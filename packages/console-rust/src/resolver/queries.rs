//! Collection queries: query-graph document, collection path and fallback path.

use serde_json::{json, Value};

use crate::client::rest::with_query;

const ORGANIZATIONS_DOCUMENT: &str = "query Organizations {
  organizations { totalCount edges { node { id name title } } }
}";

const LOCATIONS_DOCUMENT: &str = "query Locations {
  locations { totalCount edges { node { id name title } } }
}";

const CURRENT_USER_ORGANIZATIONS_DOCUMENT: &str = "query CurrentUserOrganizations {
  currentUser { organizations { totalCount edges { node { id name title } } } }
}";

const CURRENT_USER_LOCATIONS_DOCUMENT: &str = "query CurrentUserLocations {
  currentUser { locations { totalCount edges { node { id name title } } } }
}";

const HOSTGROUPS_DOCUMENT: &str = "query Hostgroups {
  hostgroups { totalCount edges { node { id name title description } } }
}";

const HOSTS_DOCUMENT: &str = "query Hosts($search: String) {
  hosts(search: $search) {
    totalCount
    edges { node { id name organization { id } location { id } hostgroup { id } } }
  }
}";

/// Everything the resolver needs to fetch one collection through either protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionQuery {
    /// Name used in logs and metrics.
    pub name: &'static str,
    /// Path of the collection under the envelope's `data`.
    pub collection: Vec<&'static str>,
    pub document: &'static str,
    pub variables: Option<Value>,
    /// Resource path used when the query-graph request fails.
    pub fallback_path: String,
}

impl CollectionQuery {
    #[must_use]
    pub fn organizations() -> Self {
        Self {
            name: "organizations",
            collection: vec!["organizations"],
            document: ORGANIZATIONS_DOCUMENT,
            variables: None,
            fallback_path: "/api/v2/organizations".to_string(),
        }
    }

    #[must_use]
    pub fn locations() -> Self {
        Self {
            name: "locations",
            collection: vec!["locations"],
            document: LOCATIONS_DOCUMENT,
            variables: None,
            fallback_path: "/api/v2/locations".to_string(),
        }
    }

    /// Organizations visible to the signed-in user (`currentUser.organizations`).
    #[must_use]
    pub fn current_user_organizations() -> Self {
        Self {
            name: "current_user_organizations",
            collection: vec!["currentUser", "organizations"],
            document: CURRENT_USER_ORGANIZATIONS_DOCUMENT,
            variables: None,
            fallback_path: "/api/v2/current_user/organizations".to_string(),
        }
    }

    /// Locations visible to the signed-in user (`currentUser.locations`).
    #[must_use]
    pub fn current_user_locations() -> Self {
        Self {
            name: "current_user_locations",
            collection: vec!["currentUser", "locations"],
            document: CURRENT_USER_LOCATIONS_DOCUMENT,
            variables: None,
            fallback_path: "/api/v2/current_user/locations".to_string(),
        }
    }

    #[must_use]
    pub fn host_groups() -> Self {
        Self {
            name: "hostgroups",
            collection: vec!["hostgroups"],
            document: HOSTGROUPS_DOCUMENT,
            variables: None,
            fallback_path: "/api/v2/hostgroups".to_string(),
        }
    }

    /// Hosts matching an optional search, for building bulk target lists.
    #[must_use]
    pub fn hosts(search: Option<&str>) -> Self {
        let fallback_path = match search {
            Some(search) => with_query("/api/v2/hosts", &[("search", search)]),
            None => "/api/v2/hosts".to_string(),
        };
        Self {
            name: "hosts",
            collection: vec!["hosts"],
            document: HOSTS_DOCUMENT,
            variables: search.map(|s| json!({ "search": s })),
            fallback_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_user_variants_nest_one_level_deeper() {
        assert_eq!(
            CollectionQuery::current_user_organizations().collection,
            vec!["currentUser", "organizations"]
        );
        assert_eq!(CollectionQuery::organizations().collection, vec!["organizations"]);
    }

    #[test]
    fn host_search_is_carried_by_both_protocols() {
        let query = CollectionQuery::hosts(Some("os = Debian"));
        assert_eq!(query.variables, Some(json!({"search": "os = Debian"})));
        assert_eq!(query.fallback_path, "/api/v2/hosts?search=os%20%3D%20Debian");

        let query = CollectionQuery::hosts(Some("café&x"));
        assert_eq!(query.fallback_path, "/api/v2/hosts?search=caf%C3%A9%26x");

        let query = CollectionQuery::hosts(None);
        assert!(query.variables.is_none());
        assert_eq!(query.fallback_path, "/api/v2/hosts");
    }
}
