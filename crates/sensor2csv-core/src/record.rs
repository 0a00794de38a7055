//! Normalized, typed sensor records and their CSV rendering.

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::Endpoint;

/// Format of the `current_time` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single typed column value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
}

impl FieldValue {
    /// CSV cell text. Floats always keep a fractional part (`1013.0`).
    pub fn to_csv_cell(&self) -> String {
        match self {
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Float(v) => format_float(*v),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            FieldValue::Int(v) => *v as f64,
            FieldValue::Float(v) => *v,
        }
    }
}

fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

/// A validated reading in the endpoint's fixed column order.
///
/// `fields` holds every column after `current_time`, aligned with
/// `endpoint.columns()[1..]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    endpoint: Endpoint,
    current_time: NaiveDateTime,
    fields: Vec<FieldValue>,
}

impl NormalizedRecord {
    pub(crate) fn new(
        endpoint: Endpoint,
        current_time: NaiveDateTime,
        fields: Vec<FieldValue>,
    ) -> Self {
        debug_assert_eq!(fields.len() + 1, endpoint.columns().len());
        Self {
            endpoint,
            current_time,
            fields,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn current_time(&self) -> NaiveDateTime {
        self.current_time
    }

    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    /// Value of a named column, if the endpoint has it.
    pub fn get(&self, column: &str) -> Option<FieldValue> {
        self.endpoint
            .columns()
            .iter()
            .skip(1)
            .position(|c| *c == column)
            .map(|idx| self.fields[idx])
    }

    /// One CSV line (with trailing newline) in column order.
    pub fn csv_row(&self) -> String {
        let mut row = self.current_time.format(TIMESTAMP_FORMAT).to_string();
        for field in &self.fields {
            row.push(',');
            row.push_str(&field.to_csv_cell());
        }
        row.push('\n');
        row
    }

    /// JSON object keyed by column name, used for history snapshots.
    pub fn snapshot(&self) -> Value {
        let columns = self.endpoint.columns();
        let mut map = Map::with_capacity(columns.len());
        map.insert(
            columns[0].to_string(),
            Value::String(self.current_time.format(TIMESTAMP_FORMAT).to_string()),
        );
        for (column, field) in columns[1..].iter().zip(&self.fields) {
            let value = serde_json::to_value(field).unwrap_or(Value::Null);
            map.insert((*column).to_string(), value);
        }
        Value::Object(map)
    }
}
