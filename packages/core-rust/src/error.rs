//! Error taxonomy shared by the core and the console layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of failure kinds used for classification and reporting.
///
/// Only `is_retryable` is meant to drive behavior; everything else about a
/// failure is carried as data in a `BulkOperationResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller or programmer error: bad params, unknown operation, malformed id.
    ValidationError,
    /// The remote system rejected or failed the request.
    ExecutionError,
    /// Transport-level failure. Folded into `ExecutionError` by the classifier.
    NetworkError,
    /// Catch-all for failures that could not be attributed.
    UnknownError,
}

impl ErrorKind {
    /// Returns the stable wire name of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::ExecutionError => "ExecutionError",
            Self::NetworkError => "NetworkError",
            Self::UnknownError => "UnknownError",
        }
    }

    /// Whether failed items under this kind may be re-dispatched at item granularity.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::ExecutionError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-side validation failures. Raised before any network call is made.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown bulk operation: {id}")]
    UnknownOperation { id: String },
    #[error("Missing required parameter: {key}")]
    MissingParameter { key: String },
    #[error("Invalid parameter {key}: expected {expected}, got {actual}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: String,
    },
    #[error("Invalid parameter {key}: {value} is below the minimum of {min}")]
    BelowMinimum { key: String, value: f64, min: f64 },
    #[error("Invalid parameter {key}: {value} is above the maximum of {max}")]
    AboveMaximum { key: String, value: f64, max: f64 },
    #[error("Invalid organization/location ID format")]
    InvalidGraphId { raw: String },
    #[error("No target ids supplied")]
    EmptyTargetSet,
    #[error("Invalid target id: {id}")]
    InvalidTargetId { id: i64 },
    #[error("Too many targets: {count} exceeds the maximum of {max}")]
    TooManyTargets { count: usize, max: usize },
    #[error("Duplicate bulk operation id: {id}")]
    DuplicateOperation { id: String },
    #[error("Nothing to retry: no failed items carry a retryable id")]
    NothingToRetry,
}

impl ValidationError {
    /// Validation errors always classify as `ErrorKind::ValidationError`.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ValidationError
    }
}
