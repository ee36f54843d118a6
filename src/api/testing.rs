//! In-memory backend for exercising the bindings without a network.

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::Transport;

#[derive(Default)]
struct Tables {
  rows: HashMap<String, Vec<Value>>,
  next_id: i64,
}

/// A fake REST backend holding one table per top-level path.
///
/// Lists answer with `{"data": [...], "total": n}` and honour a `search`
/// parameter; records are addressed as `"<table>/<id>"`.
pub(crate) struct MemoryTransport {
  tables: Mutex<Tables>,
  requests: Mutex<Vec<String>>,
  failure: Mutex<Option<String>>,
  latency: Duration,
}

impl MemoryTransport {
  pub(crate) fn new(latency: Duration) -> Self {
    Self {
      tables: Mutex::new(Tables {
        rows: HashMap::new(),
        next_id: 100,
      }),
      requests: Mutex::new(Vec::new()),
      failure: Mutex::new(None),
      latency,
    }
  }

  pub(crate) fn seed(&self, table: &str, rows: Vec<Value>) {
    self
      .tables
      .lock()
      .unwrap()
      .rows
      .insert(table.to_string(), rows);
  }

  /// Make every following request fail with `message`, or succeed again.
  pub(crate) fn fail_with(&self, message: Option<&str>) {
    *self.failure.lock().unwrap() = message.map(str::to_string);
  }

  /// Requests seen so far, e.g. `"GET barang?search=sapi"`.
  pub(crate) fn requests(&self) -> Vec<String> {
    self.requests.lock().unwrap().clone()
  }

  pub(crate) fn count(&self, prefix: &str) -> usize {
    self
      .requests
      .lock()
      .unwrap()
      .iter()
      .filter(|r| r.starts_with(prefix))
      .count()
  }

  fn respond(
    &self,
    request: String,
    handle: impl FnOnce(&mut Tables) -> Result<Value>,
  ) -> BoxFuture<'static, Result<Value>> {
    self.requests.lock().unwrap().push(request);
    let failure = self.failure.lock().unwrap().clone();
    let result = match failure {
      Some(message) => Err(eyre!(message)),
      None => {
        let mut tables = self.tables.lock().unwrap();
        handle(&mut *tables)
      }
    };
    let latency = self.latency;
    async move {
      tokio::time::sleep(latency).await;
      result
    }
    .boxed()
  }
}

fn split(path: &str) -> (String, Option<i64>) {
  match path.split_once('/') {
    Some((table, id)) => (table.to_string(), id.parse().ok()),
    None => (path.to_string(), None),
  }
}

fn matches(row: &Value, search: &str) -> bool {
  let needle = search.to_lowercase();
  row
    .as_object()
    .map(|fields| {
      fields
        .values()
        .filter_map(Value::as_str)
        .any(|s| s.to_lowercase().contains(&needle))
    })
    .unwrap_or(false)
}

fn find<'a>(rows: &'a mut [Value], id: i64) -> Result<&'a mut Value> {
  rows
    .iter_mut()
    .find(|row| row.get("id").and_then(Value::as_i64) == Some(id))
    .ok_or_else(|| eyre!("404 Not Found"))
}

impl Transport for MemoryTransport {
  fn get(&self, path: &str, query: &[(&str, String)]) -> BoxFuture<'static, Result<Value>> {
    let search = query
      .iter()
      .find(|(name, _)| *name == "search")
      .map(|(_, value)| value.clone());
    let request = match &search {
      Some(search) => format!("GET {}?search={}", path, search),
      None => format!("GET {}", path),
    };
    let (table, id) = split(path);

    self.respond(request, move |tables| {
      let rows = tables.rows.entry(table).or_default();
      match id {
        Some(id) => Ok(json!({ "data": find(rows, id)?.clone() })),
        None => {
          let found: Vec<Value> = rows
            .iter()
            .filter(|row| search.as_deref().map_or(true, |s| matches(row, s)))
            .cloned()
            .collect();
          Ok(json!({ "total": found.len(), "data": found }))
        }
      }
    })
  }

  fn post(&self, path: &str, body: Value) -> BoxFuture<'static, Result<Value>> {
    let (table, _) = split(path);
    self.respond(format!("POST {}", path), move |tables| {
      tables.next_id += 1;
      let mut row = body.as_object().cloned().unwrap_or_else(Map::new);
      row.insert("id".to_string(), json!(tables.next_id));
      let row = Value::Object(row);
      tables.rows.entry(table).or_default().push(row.clone());
      Ok(json!({ "data": row }))
    })
  }

  fn put(&self, path: &str, body: Value) -> BoxFuture<'static, Result<Value>> {
    let (table, id) = split(path);
    self.respond(format!("PUT {}", path), move |tables| {
      let id = id.ok_or_else(|| eyre!("405 Method Not Allowed"))?;
      let row = find(tables.rows.entry(table).or_default(), id)?;
      if let (Some(row), Some(changes)) = (row.as_object_mut(), body.as_object()) {
        for (field, value) in changes {
          row.insert(field.clone(), value.clone());
        }
      }
      Ok(json!({ "data": row.clone() }))
    })
  }

  fn delete(&self, path: &str) -> BoxFuture<'static, Result<Value>> {
    let (table, id) = split(path);
    self.respond(format!("DELETE {}", path), move |tables| {
      let id = id.ok_or_else(|| eyre!("405 Method Not Allowed"))?;
      let rows = tables.rows.entry(table).or_default();
      find(rows, id)?;
      rows.retain(|row| row.get("id").and_then(Value::as_i64) != Some(id));
      Ok(Value::Null)
    })
  }
}
