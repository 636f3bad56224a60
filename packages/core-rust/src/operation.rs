//! Bulk operation descriptors and the static operation registry.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ValidationError;
use crate::id::{DomainId, TargetSet};
use crate::params::{ParamBag, ParamKind, ParamSpec};

/// HTTP verbs a bulk operation may be dispatched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Put,
    Post,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

/// How the target ids are placed in the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetEncoding {
    /// `{"<key>": [ids], ...params}` (legacy multi-host endpoints).
    Flat(&'static str),
    /// `{"included": {"ids": [ids]}, ...params}` (bulk API endpoints).
    Included,
}

/// Immutable metadata describing one supported bulk action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationDescriptor {
    pub id: &'static str,
    pub label: &'static str,
    pub endpoint: &'static str,
    pub method: HttpMethod,
    pub destructive: bool,
    pub required_parameters: &'static [ParamSpec],
    pub targets: TargetEncoding,
}

impl OperationDescriptor {
    /// Builds the JSON body sent for this operation.
    ///
    /// `null` parameters are dropped; target ids always win over a parameter
    /// with the same key.
    #[must_use]
    pub fn request_body(&self, targets: &TargetSet, params: &ParamBag) -> Value {
        let ids: Vec<u64> = targets.iter().map(DomainId::get).collect();
        let mut body: Map<String, Value> = params
            .as_map()
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        match self.targets {
            TargetEncoding::Flat(key) => {
                body.insert(key.to_string(), json!(ids));
            }
            TargetEncoding::Included => {
                body.insert("included".to_string(), json!({ "ids": ids }));
            }
        }
        Value::Object(body)
    }

    /// Whether any parameter of this operation is required.
    #[must_use]
    pub fn has_required_parameters(&self) -> bool {
        self.required_parameters.iter().any(|p| p.required)
    }
}

// ---------------------------------------------------------------------------
// Built-in operations
// ---------------------------------------------------------------------------

const HOSTGROUP_PARAMS: &[ParamSpec] =
    &[ParamSpec::required("hostgroup_id", ParamKind::Number).with_min(1.0)];

const OWNER_PARAMS: &[ParamSpec] = &[ParamSpec::required("owner_id", ParamKind::String)];

const ORGANIZATION_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("organization_id", ParamKind::Number).with_min(1.0),
    ParamSpec::required("mismatch_setting", ParamKind::Boolean),
];

const LOCATION_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("location_id", ParamKind::Number).with_min(1.0),
    ParamSpec::required("mismatch_setting", ParamKind::Boolean),
];

const BUILD_PARAMS: &[ParamSpec] = &[
    ParamSpec::optional("reboot", ParamKind::Boolean),
    ParamSpec::optional("rebuild_configuration", ParamKind::Boolean),
];

const POWER_PARAMS: &[ParamSpec] = &[ParamSpec::required("power", ParamKind::String)];

/// Bulk actions the fleet API supports out of the box.
pub const BUILTIN_OPERATIONS: &[OperationDescriptor] = &[
    OperationDescriptor {
        id: "change_hostgroup",
        label: "Change host group",
        endpoint: "/hosts/update_multiple_hostgroup",
        method: HttpMethod::Put,
        destructive: false,
        required_parameters: HOSTGROUP_PARAMS,
        targets: TargetEncoding::Flat("host_ids"),
    },
    OperationDescriptor {
        id: "change_owner",
        label: "Change owner",
        endpoint: "/api/v2/hosts/bulk/change_owner",
        method: HttpMethod::Put,
        destructive: false,
        required_parameters: OWNER_PARAMS,
        targets: TargetEncoding::Included,
    },
    OperationDescriptor {
        id: "assign_organization",
        label: "Assign organization",
        endpoint: "/api/v2/hosts/bulk/assign_organization",
        method: HttpMethod::Put,
        destructive: false,
        required_parameters: ORGANIZATION_PARAMS,
        targets: TargetEncoding::Included,
    },
    OperationDescriptor {
        id: "assign_location",
        label: "Assign location",
        endpoint: "/api/v2/hosts/bulk/assign_location",
        method: HttpMethod::Put,
        destructive: false,
        required_parameters: LOCATION_PARAMS,
        targets: TargetEncoding::Included,
    },
    OperationDescriptor {
        id: "build",
        label: "Build hosts",
        endpoint: "/api/v2/hosts/bulk/build",
        method: HttpMethod::Put,
        destructive: false,
        required_parameters: BUILD_PARAMS,
        targets: TargetEncoding::Included,
    },
    OperationDescriptor {
        id: "change_power_state",
        label: "Change power state",
        endpoint: "/api/v2/hosts/bulk/change_power_state",
        method: HttpMethod::Put,
        destructive: false,
        required_parameters: POWER_PARAMS,
        targets: TargetEncoding::Included,
    },
    OperationDescriptor {
        id: "disassociate",
        label: "Disassociate hosts",
        endpoint: "/api/v2/hosts/bulk/disassociate",
        method: HttpMethod::Put,
        destructive: false,
        required_parameters: &[],
        targets: TargetEncoding::Included,
    },
    OperationDescriptor {
        id: "delete",
        label: "Delete hosts",
        endpoint: "/api/v2/hosts/bulk",
        method: HttpMethod::Delete,
        destructive: true,
        required_parameters: &[],
        targets: TargetEncoding::Included,
    },
];

// ---------------------------------------------------------------------------
// OperationRegistry
// ---------------------------------------------------------------------------

/// Fixed table of supported operations, built once at startup.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    operations: Vec<OperationDescriptor>,
    by_id: HashMap<&'static str, usize>,
}

impl OperationRegistry {
    /// Builds a registry from a configuration-time set of descriptors.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DuplicateOperation` if two descriptors share an id.
    pub fn new(operations: Vec<OperationDescriptor>) -> Result<Self, ValidationError> {
        let mut by_id = HashMap::with_capacity(operations.len());
        for (index, op) in operations.iter().enumerate() {
            if by_id.insert(op.id, index).is_some() {
                return Err(ValidationError::DuplicateOperation {
                    id: op.id.to_string(),
                });
            }
        }
        Ok(Self { operations, by_id })
    }

    /// The registry of [`BUILTIN_OPERATIONS`].
    #[must_use]
    pub fn builtin() -> Self {
        let operations = BUILTIN_OPERATIONS.to_vec();
        let by_id = operations
            .iter()
            .enumerate()
            .map(|(index, op)| (op.id, index))
            .collect();
        Self { operations, by_id }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&OperationDescriptor> {
        self.by_id.get(id).map(|&index| &self.operations[index])
    }

    /// Looks up an operation, failing with the caller-facing unknown-operation error.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownOperation` if `id` is not registered.
    pub fn require(&self, id: &str) -> Result<&OperationDescriptor, ValidationError> {
        self.get(id).ok_or_else(|| ValidationError::UnknownOperation { id: id.to_string() })
    }

    /// All operations in registration order, for building menus and forms.
    #[must_use]
    pub fn list(&self) -> &[OperationDescriptor] {
        &self.operations
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
