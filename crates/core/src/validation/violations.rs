//! Violation types produced by the input validator.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single field-level constraint violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Dotted path from the request root, e.g.
    /// `inputs.roads.features[0].properties.light_vehicles_day`.
    pub field: String,
    /// Name of the violated constraint (`range`, `pattern`, `geometry_type`, ...).
    pub constraint: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Every violation found in one request. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// A request that could not be interpreted at all.
    pub fn structural(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![FieldViolation {
                field: field.into(),
                constraint: "schema".into(),
                message: message.into(),
                value: None,
            }],
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.violations.iter().map(|v| v.field.as_str())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.violations.as_slice() {
            [] => f.write_str("Invalid inputs"),
            [only] => write!(f, "Invalid inputs: {}: {}", only.field, only.message),
            [first, rest @ ..] => write!(
                f,
                "Invalid inputs: {}: {} (and {} more)",
                first.field,
                first.message,
                rest.len()
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Accumulates violations while walking a request.
#[derive(Debug, Default)]
pub struct Violations {
    items: Vec<FieldViolation>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        field: impl Into<String>,
        constraint: &str,
        message: impl Into<String>,
        value: Option<Value>,
    ) {
        self.items.push(FieldViolation {
            field: field.into(),
            constraint: constraint.to_string(),
            message: message.into(),
            value,
        });
    }

    /// Record the errors reported by a `#[derive(Validate)]` struct whose
    /// fields live under `prefix`.
    pub fn extend_from_validator(&mut self, prefix: &str, errors: &validator::ValidationErrors) {
        for (field, errs) in errors.field_errors() {
            for err in errs.iter() {
                let message = match &err.message {
                    Some(msg) => msg.to_string(),
                    None => describe_validator_error(err),
                };
                self.push(
                    format!("{prefix}.{field}"),
                    &err.code,
                    message,
                    err.params.get("value").cloned(),
                );
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Finish the walk: `Ok` if nothing was recorded, otherwise all
    /// violations sorted by field path.
    pub fn finish(mut self) -> Result<(), ValidationError> {
        if self.items.is_empty() {
            return Ok(());
        }
        self.items.sort_by(|a, b| a.field.cmp(&b.field));
        Err(ValidationError { violations: self.items })
    }
}

fn describe_validator_error(err: &validator::ValidationError) -> String {
    let param = |name: &str| err.params.get(name).map(|v| v.to_string());
    if err.code == "range" {
        let lower = param("min")
            .map(|m| format!(">= {m}"))
            .or_else(|| param("exclusive_min").map(|m| format!("> {m}")));
        let upper = param("max")
            .map(|m| format!("<= {m}"))
            .or_else(|| param("exclusive_max").map(|m| format!("< {m}")));
        return match (lower, upper) {
            (Some(lo), Some(hi)) => format!("must be {lo} and {hi}"),
            (Some(lo), None) => format!("must be {lo}"),
            (None, Some(hi)) => format!("must be {hi}"),
            (None, None) => "out of range".to_string(),
        };
    }
    format!("failed `{}` constraint", err.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_without_violations_is_ok() {
        assert!(Violations::new().finish().is_ok());
    }

    #[test]
    fn finish_sorts_by_field_path() {
        let mut v = Violations::new();
        v.push("inputs.roads", "required", "missing", None);
        v.push("inputs.buildings", "required", "missing", None);
        let err = v.finish().unwrap_err();
        let fields: Vec<_> = err.fields().collect();
        assert_eq!(fields, vec!["inputs.buildings", "inputs.roads"]);
    }

    #[test]
    fn display_mentions_first_violation_and_count() {
        let mut v = Violations::new();
        v.push("a", "range", "must be >= 0", None);
        v.push("b", "range", "must be >= 0", None);
        let err = v.finish().unwrap_err();
        assert_eq!(err.to_string(), "Invalid inputs: a: must be >= 0 (and 1 more)");
    }
}
