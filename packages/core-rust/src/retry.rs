//! Outcome classification and the retry coordinator.

use std::collections::HashSet;

use serde::Serialize;

use crate::id::DomainId;
use crate::result::BulkOperationResult;

/// Terminal outcome of a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    /// Nothing failed and something succeeded.
    Success,
    /// Some items succeeded and some failed.
    PartialFailure,
    /// Nothing succeeded.
    TotalFailure,
}

impl Outcome {
    #[must_use]
    pub fn of(result: &BulkOperationResult) -> Self {
        match (result.success_count(), result.failed_count()) {
            (0, _) => Self::TotalFailure,
            (_, 0) => Self::Success,
            _ => Self::PartialFailure,
        }
    }

    /// Whether the caller's selection may be cleared automatically. Failures
    /// must stay visible, so only `Success` qualifies.
    #[must_use]
    pub fn auto_clear_eligible(self) -> bool {
        matches!(self, Self::Success)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialFailure => "partial_failure",
            Self::TotalFailure => "total_failure",
        }
    }
}

/// Ids worth re-dispatching after `result`.
///
/// Batch-level (generic) errors are not retryable at item granularity and are
/// skipped. Duplicates are removed, first-seen order is kept.
#[must_use]
pub fn retryable_ids(result: &BulkOperationResult) -> Vec<DomainId> {
    if result.failed_count() == 0 {
        return Vec::new();
    }
    let mut seen = HashSet::new();
    result
        .errors()
        .iter()
        .filter_map(|e| e.item_id.domain_id())
        .filter(|id| seen.insert(*id))
        .collect()
}
