//! Lenient JSON field access.
//!
//! Billing endpoints report the same quantity as an integer, a float or a
//! formatted string ("1,234", "$4.50") depending on the field and the day,
//! and rename fields between camelCase and snake_case. These helpers take an
//! ordered list of candidate keys and return the first one that coerces.

// Request counts are far below 2^53.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use serde_json::Value;

/// Coerces an int, float or numeric string to `f64`.
///
/// Strings may carry thousands separators and a leading `$`.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches('$')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// Coerces a bool, `"true"`/`"false"` or a number (non-zero is true).
pub fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        Value::Number(_) => number(value).map(|n| n != 0.0),
        _ => None,
    }
}

/// Coerces a string or number to a string.
pub fn string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first<T>(obj: &Value, keys: &[&str], f: impl Fn(&Value) -> Option<T>) -> Option<T> {
    keys.iter().find_map(|key| obj.get(*key).and_then(&f))
}

/// First key in `keys` that holds a number.
pub fn first_number(obj: &Value, keys: &[&str]) -> Option<f64> {
    first(obj, keys, number)
}

/// First key in `keys` that holds a number, rounded to an integer.
pub fn first_i64(obj: &Value, keys: &[&str]) -> Option<i64> {
    first_number(obj, keys).map(|n| n.round() as i64)
}

/// First key in `keys` that holds a boolean.
pub fn first_bool(obj: &Value, keys: &[&str]) -> Option<bool> {
    first(obj, keys, boolean)
}

/// First key in `keys` that holds a non-empty string.
pub fn first_string(obj: &Value, keys: &[&str]) -> Option<String> {
    first(obj, keys, |v| string(v).filter(|s| !s.is_empty()))
}

// ============================================================================
// Tests
// ============================================================================
