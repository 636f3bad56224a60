//! Failure classification for bulk dispatch.
//!
//! Everything that can go wrong between "validated request" and "canonical
//! result" is expressed as a [`DispatchFailure`] and mapped onto the closed
//! [`ErrorKind`] taxonomy by [`classify`].

use serde::Serialize;
use serde_json::Value;

use crate::error::{ErrorKind, ValidationError};
use crate::result::{BulkOperationResult, NormalizeError};

/// Message used when a failure carries nothing usable.
pub const UNKNOWN_FAILURE_MESSAGE: &str = "An unknown error occurred during bulk operation";

/// Any failure raised while dispatching a bulk operation.
#[derive(Debug, thiserror::Error)]
pub enum DispatchFailure {
    /// Non-2xx response. `body` is the parsed JSON body, if there was one.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        body: Option<Value>,
    },
    /// Connection, timeout or TLS failure before a response was received.
    #[error("{message}")]
    Network { message: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A 2xx response whose body could not be normalized.
    #[error(transparent)]
    Malformed(#[from] NormalizeError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("{0}")]
    Message(String),
    #[error("An unknown error occurred during bulk operation")]
    Unknown,
}

/// A failure mapped onto the taxonomy, ready for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub full_messages: Vec<String>,
}

impl ClassifiedError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            full_messages: Vec::new(),
        }
    }

    /// Synthesizes the result reported when the dispatch itself failed, so
    /// callers handle it exactly like a count-reported failure.
    #[must_use]
    pub fn into_result(self, label: &str, requested: usize) -> BulkOperationResult {
        let text = format!(
            "{label} failed for {requested} items ({}): {}",
            self.kind, self.message
        );
        BulkOperationResult::batch_failed(requested as u64, text)
    }
}

/// Maps a dispatch failure onto the taxonomy.
///
/// Rules, first match wins:
/// 1. HTTP error with a structured `{"error": {...}}` body: server message and
///    `full_messages`, `ExecutionError`, status kept.
/// 2. HTTP error without one: transport message, `ExecutionError`, status kept.
/// 3. Validation failure: `ValidationError`.
/// 4. Network, malformed-response and other error objects: their message,
///    `ExecutionError`.
/// 5. Plain message: verbatim, `ExecutionError`.
/// 6. Anything else: fixed message, `UnknownError`.
#[must_use]
pub fn classify(failure: &DispatchFailure) -> ClassifiedError {
    match failure {
        DispatchFailure::Http {
            status,
            message,
            body,
        } => {
            let mut classified = body
                .as_ref()
                .and_then(structured_error)
                .unwrap_or_else(|| ClassifiedError::new(ErrorKind::ExecutionError, message.clone()));
            classified.status = Some(*status);
            classified
        }
        DispatchFailure::Validation(err) => {
            ClassifiedError::new(ErrorKind::ValidationError, err.to_string())
        }
        DispatchFailure::Network { message } => {
            ClassifiedError::new(ErrorKind::ExecutionError, message.clone())
        }
        DispatchFailure::Malformed(err) => {
            ClassifiedError::new(ErrorKind::ExecutionError, err.to_string())
        }
        DispatchFailure::Other(err) => non_blank(err.to_string()).map_or_else(
            unknown,
            |message| ClassifiedError::new(ErrorKind::ExecutionError, message),
        ),
        DispatchFailure::Message(message) => non_blank(message.clone()).map_or_else(
            unknown,
            |message| ClassifiedError::new(ErrorKind::ExecutionError, message),
        ),
        DispatchFailure::Unknown => unknown(),
    }
}

fn unknown() -> ClassifiedError {
    tracing::error!("unclassifiable bulk operation failure");
    ClassifiedError::new(ErrorKind::UnknownError, UNKNOWN_FAILURE_MESSAGE)
}

fn non_blank(message: String) -> Option<String> {
    (!message.trim().is_empty()).then_some(message)
}

/// Extracts `error.message` / `error.full_messages` from an error body.
///
/// `{"error": "text"}` is accepted as a message-only structured body.
fn structured_error(body: &Value) -> Option<ClassifiedError> {
    let error = body.get("error")?;
    if let Some(text) = error.as_str() {
        return non_blank(text.to_string())
            .map(|message| ClassifiedError::new(ErrorKind::ExecutionError, message));
    }

    let message = error
        .get("message")
        .and_then(Value::as_str)
        .and_then(|m| non_blank(m.to_string()));
    let full_messages: Vec<String> = error
        .get("full_messages")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let text = if full_messages.is_empty() {
        message?
    } else {
        full_messages.join(", ")
    };

    let mut classified = ClassifiedError::new(ErrorKind::ExecutionError, text);
    classified.full_messages = full_messages;
    Some(classified)
}
