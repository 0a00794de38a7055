//! Payload validation and normalization.
//!
//! `validate` is the single entry point: it dispatches on the endpoint,
//! checks every required field against its schema and either returns a
//! [`NormalizedRecord`] or a [`ValidationError`] listing every failing field.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde_json::Value;
use thiserror::Error;

use crate::record::{FieldValue, NormalizedRecord};
use crate::Endpoint;

mod coerce;
mod schemas;

pub use coerce::coerce_number;
use schemas::{FieldSpec, NumberKind};

/// Client-caused payload error with a field -> reason map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed for {} field(s): {}", .details.len(), summarize(.details))]
pub struct ValidationError {
    details: BTreeMap<String, String>,
}

impl ValidationError {
    /// Single-field error, e.g. for a body that is not JSON at all.
    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut details = BTreeMap::new();
        details.insert(field.into(), reason.into());
        Self { details }
    }

    pub fn details(&self) -> &BTreeMap<String, String> {
        &self.details
    }

    pub fn into_details(self) -> BTreeMap<String, String> {
        self.details
    }
}

fn summarize(details: &BTreeMap<String, String>) -> String {
    details
        .iter()
        .map(|(field, reason)| format!("{}: {}", field, reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate a payload for `endpoint`, stamping the current local time.
pub fn validate(endpoint: Endpoint, payload: &Value) -> Result<NormalizedRecord, ValidationError> {
    validate_at(endpoint, payload, chrono::Local::now().naive_local())
}

/// Validate a payload with an explicit `current_time`.
pub fn validate_at(
    endpoint: Endpoint,
    payload: &Value,
    current_time: NaiveDateTime,
) -> Result<NormalizedRecord, ValidationError> {
    if !payload.is_object() {
        return Err(ValidationError::single("payload", "expected a JSON object"));
    }

    let specs = schemas::fields_for(endpoint);
    let mut fields = Vec::with_capacity(specs.len());
    let mut details = BTreeMap::new();

    for spec in specs {
        match check_field(payload, spec) {
            Ok(value) => fields.push(value),
            Err(reason) => {
                details.insert(spec.path.to_string(), reason);
            }
        }
    }

    if !details.is_empty() {
        return Err(ValidationError { details });
    }

    Ok(NormalizedRecord::new(endpoint, current_time, fields))
}

fn check_field(payload: &Value, spec: &FieldSpec) -> Result<FieldValue, String> {
    let raw = lookup(payload, spec.path).ok_or_else(|| "field is required".to_string())?;
    let number = coerce_number(raw)?;

    if spec.kind == NumberKind::Int && number.fract() != 0.0 {
        return Err(format!("must be an integer, got {}", number));
    }

    if number < spec.min || number > spec.max {
        return Err(format!(
            "{} is outside the allowed range [{}, {}]",
            number, spec.min, spec.max
        ));
    }

    Ok(match spec.kind {
        NumberKind::Int => FieldValue::Int(number as i64),
        NumberKind::Float => FieldValue::Float(number),
    })
}

fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(payload, |value, key| value.as_object()?.get(key))
        .filter(|value| !value.is_null())
}
