//! Operation parameter bags and the required-parameter contract.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Declared type of a single operation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
}

impl ParamKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            // serde_json never stores NaN/inf, but a number that does not fit
            // an f64 is still rejected here.
            Self::Number => value.as_f64().is_some_and(f64::is_finite),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// Inclusive numeric bounds. Either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Contract for one parameter of an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<NumericBounds>,
}

impl ParamSpec {
    #[must_use]
    pub const fn required(key: &'static str, kind: ParamKind) -> Self {
        Self {
            key,
            kind,
            required: true,
            bounds: None,
        }
    }

    #[must_use]
    pub const fn optional(key: &'static str, kind: ParamKind) -> Self {
        Self {
            key,
            kind,
            required: false,
            bounds: None,
        }
    }

    #[must_use]
    pub const fn with_min(mut self, min: f64) -> Self {
        let max = match self.bounds {
            Some(bounds) => bounds.max,
            None => None,
        };
        self.bounds = Some(NumericBounds {
            min: Some(min),
            max,
        });
        self
    }

    #[must_use]
    pub const fn with_max(mut self, max: f64) -> Self {
        let min = match self.bounds {
            Some(bounds) => bounds.min,
            None => None,
        };
        self.bounds = Some(NumericBounds {
            min,
            max: Some(max),
        });
        self
    }
}

// ---------------------------------------------------------------------------
// ParamBag
// ---------------------------------------------------------------------------

/// Operation-specific parameters supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamBag(Map<String, Value>);

impl ParamBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builds a bag from a JSON value. `null` yields an empty bag; any other
    /// non-object yields `None`.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            Value::Null => Some(Self::default()),
            _ => None,
        }
    }

    /// Parses a `key=value` argument. The value is read as a JSON literal when
    /// it is one (`5`, `true`, `null`, `"x"`), otherwise kept as a string.
    #[must_use]
    pub fn parse_assignment(raw: &str) -> Option<(String, Value)> {
        let (key, value) = raw.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        let value = serde_json::from_str(value.trim())
            .unwrap_or_else(|_| Value::String(value.trim().to_string()));
        Some((key.to_string(), value))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Checks a parameter bag against an operation's contract.
///
/// A parameter is missing only when absent or `null`; `0`, `false` and `""`
/// are present values. Type is checked before bounds, and bounds only apply
/// to present numbers. Optional parameters are checked when present.
///
/// # Errors
///
/// Returns the first violation in `specs` order.
pub fn validate(params: &ParamBag, specs: &[ParamSpec]) -> Result<(), ValidationError> {
    for spec in specs {
        let value = match params.get(spec.key) {
            None | Some(Value::Null) => {
                if spec.required {
                    return Err(ValidationError::MissingParameter {
                        key: spec.key.to_string(),
                    });
                }
                continue;
            }
            Some(value) => value,
        };

        if !spec.kind.matches(value) {
            return Err(ValidationError::TypeMismatch {
                key: spec.key.to_string(),
                expected: spec.kind.as_str(),
                actual: describe(value).to_string(),
            });
        }

        if let (Some(bounds), Some(number)) = (spec.bounds, value.as_f64()) {
            check_bounds(spec.key, number, bounds)?;
        }
    }
    Ok(())
}

fn check_bounds(key: &str, value: f64, bounds: NumericBounds) -> Result<(), ValidationError> {
    if let Some(min) = bounds.min {
        if value < min {
            return Err(ValidationError::BelowMinimum {
                key: key.to_string(),
                value,
                min,
            });
        }
    }
    if let Some(max) = bounds.max {
        if value > max {
            return Err(ValidationError::AboveMaximum {
                key: key.to_string(),
                value,
                max,
            });
        }
    }
    Ok(())
}

fn describe(value: &Value) -> &'static str {
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

    const HOSTGROUP: ParamSpec = ParamSpec::required("hostgroup_id", ParamKind::Number).with_min(1.0);

    fn bag(value: Value) -> ParamBag {
        ParamBag::from_value(value).unwrap()
    }

    #[test]
    fn zero_is_present_for_required_number() {
        let spec = [ParamSpec::required("count", ParamKind::Number)];
        assert!(validate(&bag(json!({"count": 0})), &spec).is_ok());
    }

    #[test]
    fn false_is_present_for_required_boolean() {
        let spec = [ParamSpec::required("mismatch_setting", ParamKind::Boolean)];
        assert!(validate(&bag(json!({"mismatch_setting": false})), &spec).is_ok());
    }

    #[test]
    fn absent_and_null_are_missing() {
        let spec = [HOSTGROUP];
        for params in [json!({}), json!({"hostgroup_id": null})] {
            assert_eq!(
                validate(&bag(params), &spec),
                Err(ValidationError::MissingParameter {
                    key: "hostgroup_id".to_string()
                })
            );
        }
    }

    #[test]
    fn type_mismatch_is_distinct_from_missing() {
        let err = validate(&bag(json!({"hostgroup_id": "5"})), &[HOSTGROUP]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TypeMismatch {
                key: "hostgroup_id".to_string(),
                expected: "number",
                actual: "string".to_string(),
            }
        );
    }

    #[test]
    fn bounds_checked_only_for_present_numbers() {
        let spec = [ParamSpec::optional("limit", ParamKind::Number)
            .with_min(1.0)
            .with_max(10.0)];
        assert!(validate(&bag(json!({})), &spec).is_ok());
        assert!(validate(&bag(json!({"limit": 10})), &spec).is_ok());
        assert!(matches!(
            validate(&bag(json!({"limit": 11})), &spec),
            Err(ValidationError::AboveMaximum { .. })
        ));
        assert!(matches!(
            validate(&bag(json!({"limit": 0.5})), &spec),
            Err(ValidationError::BelowMinimum { .. })
        ));
    }

    #[test]
    fn first_violation_wins() {
        let spec = [
            ParamSpec::required("a", ParamKind::String),
            ParamSpec::required("b", ParamKind::String),
        ];
        let err = validate(&bag(json!({"b": 1})), &spec).unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: a");
    }

    #[test]
    fn optional_present_values_are_type_checked() {
        let spec = [ParamSpec::optional("reboot", ParamKind::Boolean)];
        assert!(validate(&bag(json!({"reboot": "yes"})), &spec).is_err());
        assert!(validate(&bag(json!({"reboot": null})), &spec).is_ok());
    }

    #[test]
    fn with_max_keeps_existing_min() {
        let spec = ParamSpec::required("n", ParamKind::Number)
            .with_min(2.0)
            .with_max(4.0);
        assert_eq!(
            spec.bounds,
            Some(NumericBounds {
                min: Some(2.0),
                max: Some(4.0)
            })
        );
    }

    #[test]
    fn parse_assignment_reads_json_literals() {
        assert_eq!(
            ParamBag::parse_assignment("hostgroup_id=5"),
            Some(("hostgroup_id".to_string(), json!(5)))
        );
        assert_eq!(
            ParamBag::parse_assignment("reboot=false"),
            Some(("reboot".to_string(), json!(false)))
        );
        assert_eq!(
            ParamBag::parse_assignment("power=off"),
            Some(("power".to_string(), json!("off")))
        );
        assert_eq!(ParamBag::parse_assignment("=5"), None);
        assert_eq!(ParamBag::parse_assignment("novalue"), None);
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(ParamBag::from_value(json!([1, 2])).is_none());
        assert!(ParamBag::from_value(json!(null)).unwrap().is_empty());
    }
}
