//! Total accessors over loosely shaped JSON rows.
//!
//! Each accessor takes a list of accepted field names (the backend mixes
//! English and Indonesian names) and falls back to a default when no field
//! holds a usable value. None of them can fail.

use serde_json::Value;

/// Placeholder for a row without a usable name.
pub const UNNAMED: &str = "(unnamed)";

/// First non-blank string (or number, rendered) among `keys`.
pub fn text(raw: &Value, keys: &[&str]) -> Option<String> {
  keys
    .iter()
    .filter_map(|key| raw.get(*key))
    .find_map(|value| match value {
      Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    })
}

pub fn text_or(raw: &Value, keys: &[&str], default: &str) -> String {
  text(raw, keys).unwrap_or_else(|| default.to_string())
}

/// First integer among `keys`. Integral floats and numeric strings count.
pub fn integer(raw: &Value, keys: &[&str]) -> Option<i64> {
  keys
    .iter()
    .filter_map(|key| raw.get(*key))
    .find_map(|value| match value {
      Value::Number(n) => n.as_i64().or_else(|| {
        n.as_f64()
          .filter(|f| f.is_finite() && f.fract() == 0.0)
          .map(|f| f as i64)
      }),
      Value::String(s) => s.trim().parse().ok(),
      _ => None,
    })
}

/// First finite number among `keys`, or zero.
pub fn decimal(raw: &Value, keys: &[&str]) -> f64 {
  keys
    .iter()
    .filter_map(|key| raw.get(*key))
    .find_map(|value| match value {
      Value::Number(n) => n.as_f64(),
      Value::String(s) => s.trim().parse::<f64>().ok(),
      _ => None,
    })
    .filter(|f| f.is_finite())
    .unwrap_or(0.0)
}

/// First boolean-ish value among `keys`, or `default`.
pub fn flag(raw: &Value, keys: &[&str], default: bool) -> bool {
  keys
    .iter()
    .filter_map(|key| raw.get(*key))
    .find_map(|value| match value {
      Value::Bool(b) => Some(*b),
      Value::Number(n) => n.as_i64().map(|n| n != 0),
      Value::String(s) => match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "ya" | "active" | "aktif" => Some(true),
        "false" | "0" | "no" | "tidak" | "inactive" | "nonaktif" => Some(false),
        _ => None,
      },
      _ => None,
    })
    .unwrap_or(default)
}

/// Render a number without a fractional part when it has none.
pub fn format_number(value: f64) -> String {
  if value.fract() == 0.0 {
    format!("{:.0}", value)
  } else {
    format!("{:.2}", value)
  }
}

pub fn yes_no(value: bool) -> String {
  let label = if value { "yes" } else { "no" };
  label.to_string()
}
