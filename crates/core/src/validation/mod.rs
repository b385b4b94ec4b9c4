//! Input validation for process execution requests.
//!
//! [`validate`] turns an untrusted execute body into a [`ValidatedRequest`].
//! A body that cannot be read as the input schema at all fails with one
//! structural violation; otherwise every constraint is checked and all
//! violations are reported together, sorted by field path.

pub mod geojson;
pub mod inputs;
pub mod violations;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use inputs::ProcessInputs;
pub use violations::{FieldViolation, ValidationError, Violations};

use crate::hashing::request_fingerprint;
use crate::process::{OutputId, ProcessId};

/// A request that has passed validation. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedRequest {
    pub process: ProcessId,
    /// The `inputs` object as the client sent it.
    pub inputs: Value,
    /// Requested outputs, de-duplicated and in catalogue order.
    pub outputs: Vec<OutputId>,
    pub fingerprint: String,
    pub building_count: usize,
    pub road_count: usize,
}

/// Validate an execute body of the form
/// `{"inputs": {...}, "outputs": {...} | [...]}`.
pub fn validate(process: ProcessId, body: &Value) -> Result<ValidatedRequest, ValidationError> {
    let Some(body) = body.as_object() else {
        return Err(ValidationError::structural("", "request body must be a JSON object"));
    };
    let raw_inputs = match body.get("inputs") {
        Some(inputs @ Value::Object(_)) => inputs,
        Some(_) => return Err(ValidationError::structural("inputs", "must be a JSON object")),
        None => return Err(ValidationError::structural("inputs", "is required")),
    };

    let parsed = ProcessInputs::deserialize(raw_inputs)
        .map_err(|e| ValidationError::structural("inputs", e.to_string()))?;

    let mut v = Violations::new();
    inputs::check_inputs(process, &parsed, &mut v);
    let outputs = select_outputs(process, body.get("outputs"), &mut v);
    v.finish()?;

    tracing::debug!(
        process = %process,
        buildings = parsed.buildings.features.len(),
        roads = parsed.roads.features.len(),
        "Request validated"
    );

    Ok(ValidatedRequest {
        process,
        fingerprint: request_fingerprint(process.as_str(), raw_inputs),
        inputs: raw_inputs.clone(),
        outputs,
        building_count: parsed.buildings.features.len(),
        road_count: parsed.roads.features.len(),
    })
}

/// Resolve the `outputs` member. Absent, `null` or empty selects every
/// output the process offers.
fn select_outputs(process: ProcessId, outputs: Option<&Value>, v: &mut Violations) -> Vec<OutputId> {
    let names: Vec<String> = match outputs {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => {
            let mut names = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item.as_str() {
                    Some(name) => names.push(name.to_string()),
                    None => v.push(format!("outputs[{i}]"), "type", "must be an output id", Some(item.clone())),
                }
            }
            names
        }
        Some(other) => {
            v.push("outputs", "type", "must be an object or an array", Some(other.clone()));
            return Vec::new();
        }
    };

    if names.is_empty() {
        return process.outputs().to_vec();
    }

    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        match OutputId::parse(&name).filter(|o| process.outputs().contains(o)) {
            Some(output) => selected.push(output),
            None => v.push(
                format!("outputs.{name}"),
                "unknown_output",
                format!("process {process} has no output named {name}"),
                None,
            ),
        }
    }
    selected.sort();
    selected.dedup();
    selected
}
