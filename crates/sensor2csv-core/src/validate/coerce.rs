// Numeric coercion for sensor values
//
// Devices send numbers either as JSON numbers or as strings with units
// attached ("1013hPa", "25.1C", "415 ppm"). Units and symbols around the
// number are stripped before parsing.

use serde_json::Value;

/// Coerce a JSON value into a finite `f64`, stripping unit prefixes/suffixes.
///
/// Returns a human-readable reason on failure.
pub fn coerce_number(value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("cannot represent {} as a number", n))?,
        Value::String(raw) => parse_with_units(raw)?,
        other => return Err(format!("expected a number, got {}", kind_of(other))),
    };

    if !parsed.is_finite() {
        return Err("value must be finite".to_string());
    }
    Ok(parsed)
}

fn parse_with_units(raw: &str) -> Result<f64, String> {
    let stripped = raw
        .trim()
        .trim_start_matches(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.')))
        .trim_end_matches(|c: char| !(c.is_ascii_digit() || c == '.'));

    if stripped.is_empty() {
        return Err(format!("cannot parse '{}' as a number", raw));
    }

    stripped
        .parse::<f64>()
        .map_err(|_| format!("cannot parse '{}' as a number", raw))
}

fn kind_of(value: &Value) -> &'static str {
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
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_unit_suffixes() {
        assert_eq!(coerce_number(&json!("1013hPa")).unwrap(), 1013.0);
        assert_eq!(coerce_number(&json!("25.1C")).unwrap(), 25.1);
        assert_eq!(coerce_number(&json!("415 ppm")).unwrap(), 415.0);
        assert_eq!(coerce_number(&json!("12.5 kOhms")).unwrap(), 12.5);
    }

    #[test]
    fn strips_symbol_prefixes() {
        assert_eq!(coerce_number(&json!("~-4.5°C")).unwrap(), -4.5);
        assert_eq!(coerce_number(&json!("  45% ")).unwrap(), 45.0);
    }

    #[test]
    fn accepts_plain_json_numbers() {
        assert_eq!(coerce_number(&json!(12)).unwrap(), 12.0);
        assert_eq!(coerce_number(&json!(0.25)).unwrap(), 0.25);
    }

    #[test]
    fn rejects_non_numeric_values() {
        assert!(coerce_number(&json!("hot"))
            .unwrap_err()
            .contains("cannot parse 'hot'"));
        assert!(coerce_number(&json!("1.2.3C")).is_err());
        assert!(coerce_number(&json!(true))
            .unwrap_err()
            .contains("got boolean"));
        assert!(coerce_number(&Value::Null).unwrap_err().contains("got null"));
        assert!(coerce_number(&json!({"v": 1})).is_err());
    }

    #[test]
    fn rejects_overflowing_values() {
        assert_eq!(
            coerce_number(&json!("1e999")).unwrap_err(),
            "value must be finite"
        );
    }
}
