//! Native domain identifiers and target sets.
//!
//! Every external identifier form (relay-style global ids, stringly-typed ids
//! from forms, REST records) is converted into a [`DomainId`] before it
//! crosses into domain logic.

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Default upper bound on the number of distinct targets in one bulk operation.
pub const DEFAULT_MAX_TARGETS: usize = 1000;

/// Wire value of [`ItemRef::Generic`].
pub const GENERIC_ITEM_ID: i64 = -1;

/// Positive integer identifying an organization, location, host, host group or user.
///
/// # Invariants
/// - Always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(NonZeroU64);

impl DomainId {
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Returns `None` for zero and negative values.
    #[must_use]
    pub fn from_raw(raw: i64) -> Option<Self> {
        u64::try_from(raw).ok().and_then(NonZeroU64::new).map(Self)
    }

    /// Returns `None` for zero.
    #[must_use]
    pub fn from_u64(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

// ---------------------------------------------------------------------------
// ItemRef
// ---------------------------------------------------------------------------

/// Target of an item-level error: either a specific entity or the whole batch.
///
/// `Generic` marks errors unrelated to any single item (e.g. the request itself
/// failed). It is encoded as `-1` on the wire, and any non-positive, missing
/// or non-numeric `item_id` decodes to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemRef {
    Item(DomainId),
    #[default]
    Generic,
}

impl ItemRef {
    /// Returns the entity id, if this refers to one.
    #[must_use]
    pub fn domain_id(self) -> Option<DomainId> {
        match self {
            Self::Item(id) => Some(id),
            Self::Generic => None,
        }
    }

    #[must_use]
    pub fn is_generic(self) -> bool {
        matches!(self, Self::Generic)
    }
}

impl From<DomainId> for ItemRef {
    fn from(id: DomainId) -> Self {
        Self::Item(id)
    }
}

impl From<i64> for ItemRef {
    fn from(raw: i64) -> Self {
        DomainId::from_raw(raw).map_or(Self::Generic, Self::Item)
    }
}

impl Serialize for ItemRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Item(id) => serializer.serialize_u64(id.get()),
            Self::Generic => serializer.serialize_i64(GENERIC_ITEM_ID),
        }
    }
}

impl<'de> Deserialize<'de> for ItemRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        let item = match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Int(n)) => Self::from(n),
            #[allow(clippy::cast_possible_truncation)]
            Some(Raw::Float(f)) if f.fract() == 0.0 && f.is_finite() => Self::from(f as i64),
            Some(Raw::Text(s)) => s.trim().parse::<i64>().map_or(Self::Generic, Self::from),
            Some(Raw::Float(_)) | None => Self::Generic,
        };
        Ok(item)
    }
}

// ---------------------------------------------------------------------------
// TargetSet
// ---------------------------------------------------------------------------

/// Non-empty, deduplicated, ordered set of entities a bulk operation acts upon.
///
/// # Invariants
/// - At least one element.
/// - Every element is a positive id.
/// - No more than the configured maximum number of elements.
/// - First-seen order of the input is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TargetSet {
    ids: Vec<DomainId>,
}

impl TargetSet {
    /// Builds a target set from raw ids.
    ///
    /// # Errors
    ///
    /// - `ValidationError::EmptyTargetSet` if `raw` is empty
    /// - `ValidationError::InvalidTargetId` for the first non-positive id
    /// - `ValidationError::TooManyTargets` if more than `max` distinct ids remain
    pub fn new<I>(raw: I, max: usize) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for value in raw {
            let id = DomainId::from_raw(value)
                .ok_or(ValidationError::InvalidTargetId { id: value })?;
            if seen.insert(id) {
                ids.push(id);
            }
        }
        Self::from_ids(ids, max)
    }

    /// Builds a target set from already-validated ids, deduplicating them.
    ///
    /// # Errors
    ///
    /// Same as [`TargetSet::new`], minus the positivity check.
    pub fn from_domain_ids<I>(raw: I, max: usize) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = DomainId>,
    {
        let mut seen = HashSet::new();
        let ids = raw.into_iter().filter(|id| seen.insert(*id)).collect();
        Self::from_ids(ids, max)
    }

    fn from_ids(ids: Vec<DomainId>, max: usize) -> Result<Self, ValidationError> {
        if ids.is_empty() {
            return Err(ValidationError::EmptyTargetSet);
        }
        if ids.len() > max {
            return Err(ValidationError::TooManyTargets {
                count: ids.len(),
                max,
            });
        }
        Ok(Self { ids })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Always false for a constructed set; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[DomainId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = DomainId> + '_ {
        self.ids.iter().copied()
    }

    #[must_use]
    pub fn contains(&self, id: DomainId) -> bool {
        self.ids.contains(&id)
    }
}

impl<'a> IntoIterator for &'a TargetSet {
    type Item = &'a DomainId;
    type IntoIter = std::slice::Iter<'a, DomainId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}
