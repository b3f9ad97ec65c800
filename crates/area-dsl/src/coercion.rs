// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Coercions between loosely typed provider data and the string/number views
//! used by templates, filters and change detection.
//!
//! # Conversions
//!
//! | From | [`to_text`] | [`to_number`] |
//! |------|-------------|---------------|
//! | String | as-is | trimmed, parsed as f64 |
//! | Number | `42`, `1.5` | the number |
//! | Bool | `true` / `false` | none |
//! | Null | `""` | none |
//! | Array / Object | compact JSON | none |

use serde_json::{Number, Value};

/// Natural string form of a value.
///
/// ```
/// use serde_json::json;
/// use area_dsl::coercion::to_text;
///
/// assert_eq!(to_text(&json!("open")), "open");
/// assert_eq!(to_text(&json!(5.0)), "5");
/// assert_eq!(to_text(&json!({"a": 1})), r#"{"a":1}"#);
/// ```
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_text(n),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn number_to_text(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        n.as_f64().map(format_number).unwrap_or_else(|| n.to_string())
    }
}

/// Numeric view of a value. Strings are trimmed and parsed; blank strings,
/// booleans and containers are not numeric.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

/// Shortest decimal rendering of `value` without exponent or trailing zeros.
pub fn format_number(value: f64) -> String {
    // f64's Display already produces the shortest round-trip form
    format!("{}", value)
}

/// True when the value is a non-container scalar (null included).
pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_text_scalars() {
        assert_eq!(to_text(&json!(null)), "");
        assert_eq!(to_text(&json!(true)), "true");
        assert_eq!(to_text(&json!(42)), "42");
        assert_eq!(to_text(&json!(-7)), "-7");
        assert_eq!(to_text(&json!(12.5)), "12.5");
        assert_eq!(to_text(&json!(100.0)), "100");
        assert_eq!(to_text(&json!(u64::MAX)), u64::MAX.to_string());
    }

    #[test]
    fn test_to_text_containers_are_json() {
        assert_eq!(to_text(&json!([1, "a"])), r#"[1,"a"]"#);
        assert_eq!(to_text(&json!({"k": null})), r#"{"k":null}"#);
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!(3)), Some(3.0));
        assert_eq!(to_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(to_number(&json!("")), None);
        assert_eq!(to_number(&json!("abc")), None);
        assert_eq!(to_number(&json!("NaN")), None);
        assert_eq!(to_number(&json!(true)), None);
        assert_eq!(to_number(&json!(null)), None);
        assert_eq!(to_number(&json!([1])), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(-3.25), "-3.25");
        assert_eq!(format_number(1e21), "1000000000000000000000");
    }
}
