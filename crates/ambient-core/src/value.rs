//! Lenient field access over service JSON
//!
//! Service payloads are partially specified: fields go missing, numbers
//! arrive as strings and vice versa. These helpers never fail; they fall
//! back to the empty/zero value instead.

use serde_json::Value;

/// Read a field as a string. Numbers and booleans are stringified;
/// missing, null, arrays and objects yield `""`.
pub fn string_at(value: &Value, key: &str) -> String {
    value.get(key).map(as_string).unwrap_or_default()
}

/// Like [`string_at`] but distinguishes an absent/null field
pub fn opt_string_at(value: &Value, key: &str) -> Option<String> {
    match value.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => Some(as_string(v)),
    }
}

/// Read a field as an integer; floats truncate, numeric strings parse
pub fn i64_at(value: &Value, key: &str) -> i64 {
    match value.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Read a field as a float; numeric strings parse
pub fn f64_at(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Like [`f64_at`] but `None` when the field is absent or not numeric
pub fn opt_f64_at(value: &Value, key: &str) -> Option<f64> {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
