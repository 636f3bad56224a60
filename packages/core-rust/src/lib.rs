//! Fleet console core: identifiers, operation registry, parameter
//! validation, result normalization and failure classification.
//!
//! Everything here is pure: no I/O, no clocks, no shared state.

pub mod classify;
pub mod codec;
pub mod error;
pub mod id;
pub mod operation;
pub mod params;
pub mod result;
pub mod retry;

pub use classify::{classify, ClassifiedError, DispatchFailure};
pub use error::{ErrorKind, ValidationError};
pub use id::{DomainId, ItemRef, TargetSet, DEFAULT_MAX_TARGETS};
pub use operation::{HttpMethod, OperationDescriptor, OperationRegistry, TargetEncoding};
pub use params::{validate, ParamBag, ParamKind, ParamSpec};
pub use result::{normalize, BulkOperationResult, ItemError, NormalizeError};
pub use retry::{retryable_ids, Outcome};
