//! Canonical bulk operation result and the normalizer that produces it.
//!
//! Upstream responses arrive in two shapes: a count-bearing object carrying
//! per-item outcomes, or a bare success message. Both are decoded into
//! [`RawBulkResponse`] at the boundary and converted into a
//! [`BulkOperationResult`]; nothing downstream sees the raw shape.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::id::{DomainId, ItemRef};

/// Errors produced while normalizing an upstream response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("malformed bulk response: expected a JSON object, got {found}")]
    NotAnObject { found: &'static str },
    #[error("malformed bulk response: no counts and no message")]
    NoSignal,
    #[error("malformed bulk response: {0}")]
    Malformed(String),
}

/// One failed item, or a batch-level failure when `item_id` is generic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub item_id: ItemRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    pub message: String,
}

impl ItemError {
    #[must_use]
    pub fn new(item_id: impl Into<ItemRef>, message: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            item_name: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ItemRef::Generic, message)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.item_name = Some(name.into());
        self
    }
}

// ---------------------------------------------------------------------------
// BulkOperationResult
// ---------------------------------------------------------------------------

/// Canonical outcome of one bulk operation.
///
/// # Invariants
/// - If both counts are zero, `message` is present.
///
/// `success_count + failed_count` is not required to equal the number of
/// targets: asynchronous endpoints may report partial counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkOperationResult {
    success_count: u64,
    failed_count: u64,
    errors: Vec<ItemError>,
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    is_async: bool,
    missed_items: Vec<DomainId>,
}

impl BulkOperationResult {
    /// Checked constructor.
    ///
    /// # Errors
    ///
    /// Returns `NormalizeError::NoSignal` if both counts are zero and there is
    /// no (non-blank) message.
    pub fn new(
        success_count: u64,
        failed_count: u64,
        message: Option<String>,
    ) -> Result<Self, NormalizeError> {
        let message = message.filter(|m| !m.trim().is_empty());
        if success_count == 0 && failed_count == 0 && message.is_none() {
            return Err(NormalizeError::NoSignal);
        }
        Ok(Self {
            success_count,
            failed_count,
            errors: Vec::new(),
            warnings: Vec::new(),
            message,
            is_async: false,
            missed_items: Vec::new(),
        })
    }

    /// A result in which every requested target succeeded.
    #[must_use]
    pub fn all_succeeded(requested: u64, message: Option<String>) -> Self {
        Self {
            success_count: requested,
            failed_count: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            message: message.or_else(|| (requested == 0).then(|| "No items processed".to_string())),
            is_async: false,
            missed_items: Vec::new(),
        }
    }

    /// A result in which the whole batch failed for one batch-level reason.
    #[must_use]
    pub fn batch_failed(requested: u64, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success_count: 0,
            failed_count: requested,
            errors: vec![ItemError::generic(message.clone())],
            warnings: Vec::new(),
            message: Some(message),
            is_async: false,
            missed_items: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ItemError>) -> Self {
        self.errors = errors;
        self
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    #[must_use]
    pub fn with_async(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }

    #[must_use]
    pub fn with_missed_items(mut self, missed_items: Vec<DomainId>) -> Self {
        self.missed_items = missed_items;
        self
    }

    #[must_use]
    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    #[must_use]
    pub fn failed_count(&self) -> u64 {
        self.failed_count
    }

    #[must_use]
    pub fn errors(&self) -> &[ItemError] {
        &self.errors
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    #[must_use]
    pub fn missed_items(&self) -> &[DomainId] {
        &self.missed_items
    }

    /// Short human summary, e.g. `"3 succeeded, 1 failed"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!("{} succeeded, {} failed", self.success_count, self.failed_count);
        if self.is_async {
            out.push_str(" (running asynchronously)");
        }
        if let Some(message) = &self.message {
            out.push_str(": ");
            out.push_str(message);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Boundary decoding
// ---------------------------------------------------------------------------

/// The two upstream response shapes a bulk endpoint may return.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBulkResponse {
    CountBearing(RawCounts),
    MessageOnly { message: String },
}

/// Count-bearing response body. Missing or `null` fields take their
/// documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCounts {
    #[serde(default, alias = "successCount")]
    pub success_count: Option<u64>,
    #[serde(default, alias = "failedCount")]
    pub failed_count: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<RawItemError>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "isAsync", deserialize_with = "null_as_default")]
    pub is_async: bool,
    #[serde(default, alias = "missedItems", deserialize_with = "null_as_default")]
    pub missed_items: Vec<ItemRef>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Item error as sent by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawItemError {
    #[serde(default, alias = "itemId")]
    pub item_id: ItemRef,
    #[serde(default, alias = "itemName")]
    pub item_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

const COUNT_KEYS: [&str; 4] = ["success_count", "successCount", "failed_count", "failedCount"];

impl RawBulkResponse {
    /// Decodes an upstream JSON value into one of the known shapes.
    ///
    /// # Errors
    ///
    /// - `NormalizeError::NotAnObject` for any non-object value
    /// - `NormalizeError::NoSignal` for an object with neither counts nor a message
    /// - `NormalizeError::Malformed` if a count-bearing object has ill-typed fields
    pub fn decode(raw: &Value) -> Result<Self, NormalizeError> {
        let Value::Object(map) = raw else {
            return Err(NormalizeError::NotAnObject {
                found: json_type(raw),
            });
        };

        if COUNT_KEYS.iter().any(|key| map.contains_key(*key)) {
            let counts = RawCounts::deserialize(raw)
                .map_err(|e| NormalizeError::Malformed(e.to_string()))?;
            return Ok(Self::CountBearing(counts));
        }

        match map.get("message") {
            Some(Value::String(message)) if !message.trim().is_empty() => Ok(Self::MessageOnly {
                message: message.clone(),
            }),
            _ => Err(NormalizeError::NoSignal),
        }
    }
}

/// Converts a raw operation response into the canonical result.
///
/// A message-only response is an HTTP success, so every requested target is
/// counted as succeeded; message text is never parsed for counts.
///
/// # Errors
///
/// See [`RawBulkResponse::decode`]; additionally `NormalizeError::NoSignal`
/// when a count-bearing response reports zero of both with no message.
pub fn normalize(raw: &Value, requested: usize) -> Result<BulkOperationResult, NormalizeError> {
    match RawBulkResponse::decode(raw)? {
        RawBulkResponse::MessageOnly { message } => Ok(BulkOperationResult::all_succeeded(
            requested as u64,
            Some(message),
        )),
        RawBulkResponse::CountBearing(counts) => {
            let errors = counts
                .errors
                .into_iter()
                .map(|e| ItemError {
                    item_id: e.item_id,
                    item_name: e.item_name,
                    message: e.message.unwrap_or_else(|| "Unknown error".to_string()),
                })
                .collect();
            let missed = counts
                .missed_items
                .into_iter()
                .filter_map(ItemRef::domain_id)
                .collect();
            Ok(BulkOperationResult::new(
                counts.success_count.unwrap_or(0),
                counts.failed_count.unwrap_or(0),
                counts.message,
            )?
            .with_errors(errors)
            .with_warnings(counts.warnings)
            .with_async(counts.is_async)
            .with_missed_items(missed))
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn id(raw: i64) -> DomainId {
        DomainId::from_raw(raw).unwrap()
    }

    #[test]
    fn count_bearing_response_passes_through_with_default_warnings() {
        let raw = json!({
            "success_count": 2,
            "failed_count": 1,
            "errors": [{"item_id": 3, "message": "Permission denied"}]
        });
        let result = normalize(&raw, 3).unwrap();

        assert_eq!(result.success_count(), 2);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.errors(), &[ItemError::new(id(3), "Permission denied")]);
        assert!(result.warnings().is_empty());
        assert!(!result.is_async());

        let mut expected = raw.clone();
        expected["warnings"] = json!([]);
        expected["is_async"] = json!(false);
        expected["missed_items"] = json!([]);
        assert_eq!(serde_json::to_value(&result).unwrap(), expected);
    }

    #[test]
    fn message_only_response_trusts_the_status_code() {
        let result = normalize(&json!({"message": "Built 5 hosts"}), 5).unwrap();
        assert_eq!(result.success_count(), 5);
        assert_eq!(result.failed_count(), 0);
        assert!(result.errors().is_empty());
        assert_eq!(result.message(), Some("Built 5 hosts"));
    }

    #[test]
    fn camel_case_counts_are_accepted() {
        let raw = json!({
            "successCount": 1,
            "failedCount": 1,
            "errors": [{"itemId": 9, "itemName": "web-01", "message": "boom"}],
            "isAsync": true,
            "missedItems": [4, -1]
        });
        let result = normalize(&raw, 2).unwrap();
        assert_eq!(result.errors()[0].item_name.as_deref(), Some("web-01"));
        assert!(result.is_async());
        assert_eq!(result.missed_items(), &[id(4)]);
    }

    #[test]
    fn non_objects_are_rejected() {
        for raw in [json!(null), json!("ok"), json!([1]), json!(5)] {
            assert!(matches!(
                normalize(&raw, 1),
                Err(NormalizeError::NotAnObject { .. })
            ));
        }
    }

    #[test]
    fn zero_counts_without_message_are_rejected() {
        assert_eq!(
            normalize(&json!({"success_count": 0, "failed_count": 0}), 3),
            Err(NormalizeError::NoSignal)
        );
        assert_eq!(normalize(&json!({}), 3), Err(NormalizeError::NoSignal));
        assert_eq!(normalize(&json!({"message": "  "}), 3), Err(NormalizeError::NoSignal));
    }

    #[test]
    fn zero_counts_with_message_are_accepted() {
        let result = normalize(
            &json!({"success_count": 0, "failed_count": 0, "message": "Queued", "is_async": true}),
            3,
        )
        .unwrap();
        assert_eq!(result.message(), Some("Queued"));
        assert!(result.is_async());
    }

    #[test]
    fn ill_typed_counts_are_malformed() {
        assert!(matches!(
            normalize(&json!({"success_count": "two"}), 2),
            Err(NormalizeError::Malformed(_))
        ));
    }

    #[test]
    fn null_subfields_take_their_defaults() {
        let result = normalize(
            &json!({
                "success_count": 2,
                "failed_count": 0,
                "errors": null,
                "warnings": null,
                "is_async": null,
                "missed_items": null,
                "message": null
            }),
            2,
        )
        .unwrap();
        assert_eq!(result.success_count(), 2);
        assert!(result.errors().is_empty());
        assert!(result.warnings().is_empty());
        assert!(!result.is_async());
        assert!(result.missed_items().is_empty());

        let camel = normalize(&json!({"successCount": 1, "isAsync": null, "missedItems": null}), 1)
            .unwrap();
        assert!(!camel.is_async());
    }

    #[test]
    fn item_errors_without_id_or_message_get_defaults() {
        let result = normalize(&json!({"failed_count": 1, "errors": [{}]}), 1).unwrap();
        assert_eq!(result.errors(), &[ItemError::generic("Unknown error")]);
    }

    #[test]
    fn batch_failed_carries_a_generic_error() {
        let result = BulkOperationResult::batch_failed(4, "nope");
        assert_eq!(result.failed_count(), 4);
        assert_eq!(result.success_count(), 0);
        assert!(result.errors()[0].item_id.is_generic());
    }

    #[test]
    fn summary_mentions_counts_and_message() {
        let result = BulkOperationResult::new(3, 1, Some("done".to_string())).unwrap();
        assert_eq!(result.summary(), "3 succeeded, 1 failed: done");
    }
}
