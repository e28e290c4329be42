//! Scalar coercion between command text and JSON values.
//!
//! Command fields arrive as text. A field that reads as a number is stored as
//! a JSON number; everything else stays a string.

use serde_json::Value;

/// Parse `text` as a finite number.
///
/// Accepts decimal and exponent forms with an optional sign, and `0x`/`0o`/`0b`
/// integer prefixes. Empty text and non-finite results are not numbers.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let radix = match text.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&text[2..], radix).ok().map(|n| n as f64);
    }

    // Rust accepts "inf" and "nan" spellings; those never count as numeric.
    if !text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'))
    {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Build a JSON number, preferring the integer form for integral values.
pub fn number_value(n: f64) -> Value {
    const SAFE_INT: f64 = 9_007_199_254_740_992.0; // 2^53
    if n.fract() == 0.0 && n.abs() < SAFE_INT {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// Coerce a command field: numbers become JSON numbers, the rest strings.
pub fn coerce_scalar(text: &str) -> Value {
    match parse_number(text) {
        Some(n) => number_value(n),
        None => Value::String(text.to_string()),
    }
}

/// Read an existing state value as an addend.
///
/// `null` counts as 0 and booleans as 0/1. Arrays, objects and non-numeric
/// strings have no numeric reading.
pub fn numeric_reading(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        Value::Array(_) | Value::Object(_) => None,
    }
}
