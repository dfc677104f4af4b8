//! Utility functions and helpers.

pub mod http;
pub mod url;

use serde_json::{Number, Value};

/// Largest integer that survives a round trip through an IEEE double.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Render a number the way the static consumer prints it: integral values
/// without a fractional part, `-0` as `0`.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        return format!("{}", value as i64);
    }
    format!("{value}")
}

/// JSON number for a finite value, integral when possible. Non-finite input
/// becomes 0.
pub fn json_number(value: f64) -> Number {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        return Number::from(value as i64);
    }
    Number::from_f64(value).unwrap_or_else(|| Number::from(0))
}

/// Stringify a loosely-typed JSON cell. Null becomes empty; text is trimmed.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

/// Parse a number after stripping thousand separators. `None` when the text is
/// not a finite number; blank text is 0.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned = text.trim().replace(',', "");
    if cleaned.is_empty() {
        return Some(0.0);
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}
