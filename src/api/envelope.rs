//! Response shapes the backend is known to return.
//!
//! Lists come back either as a bare array or wrapped in an object, sometimes
//! twice (a paginator inside a `data` field). Parsing is total: anything
//! unrecognised is an empty list.

use serde_json::Value;

const ROW_FIELDS: [&str; 3] = ["data", "rows", "items"];
const TOTAL_FIELDS: [&str; 4] = ["total", "totalCount", "total_count", "count"];

/// Raw rows of a list response plus the server-side total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListEnvelope {
  pub rows: Vec<Value>,
  pub total: u64,
}

pub fn parse_list(value: &Value) -> ListEnvelope {
  match value {
    Value::Array(rows) => ListEnvelope {
      rows: rows.clone(),
      total: rows.len() as u64,
    },
    Value::Object(_) => {
      let (rows, inner) = find_rows(value);
      let total = inner
        .and_then(find_total)
        .or_else(|| find_total(value))
        .unwrap_or(rows.len() as u64);
      ListEnvelope { rows, total }
    }
    _ => ListEnvelope::default(),
  }
}

/// A single record, unwrapped from `{"data": {...}}` when wrapped.
pub fn parse_record(value: &Value) -> &Value {
  match value.get("data") {
    Some(inner @ Value::Object(_)) => inner,
    _ => value,
  }
}

/// Rows from the first array-valued row field, looking one object deep.
/// Also returns the nested object the rows were found in, if any.
fn find_rows(value: &Value) -> (Vec<Value>, Option<&Value>) {
  for field in ROW_FIELDS {
    if let Some(Value::Array(rows)) = value.get(field) {
      return (rows.clone(), None);
    }
  }
  for field in ROW_FIELDS {
    if let Some(inner @ Value::Object(_)) = value.get(field) {
      for nested in ROW_FIELDS {
        if let Some(Value::Array(rows)) = inner.get(nested) {
          return (rows.clone(), Some(inner));
        }
      }
    }
  }
  (Vec::new(), None)
}

fn find_total(value: &Value) -> Option<u64> {
  TOTAL_FIELDS
    .iter()
    .find_map(|field| value.get(*field).and_then(as_count))
    .or_else(|| value.get("meta").and_then(|meta| meta.get("total")).and_then(as_count))
}

fn as_count(value: &Value) -> Option<u64> {
  match value {
    Value::Number(n) => n
      .as_u64()
      .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}
