//! HTTP transport for the backend REST API.

mod client;
mod envelope;

#[cfg(test)]
pub(crate) mod testing;

pub use client::ApiClient;
pub use envelope::{parse_list, parse_record, ListEnvelope};

use color_eyre::Result;
use futures::future::BoxFuture;
use serde_json::Value;

/// JSON-over-HTTP operations the resource bindings need.
///
/// Paths are relative to the configured base URL (`"barang"`,
/// `"barang/7"`). Futures are `'static` so they can be handed straight to
/// the query engine as fetches.
pub trait Transport: Send + Sync + 'static {
  fn get(&self, path: &str, query: &[(&str, String)]) -> BoxFuture<'static, Result<Value>>;

  fn post(&self, path: &str, body: Value) -> BoxFuture<'static, Result<Value>>;

  fn put(&self, path: &str, body: Value) -> BoxFuture<'static, Result<Value>>;

  fn delete(&self, path: &str) -> BoxFuture<'static, Result<Value>>;
}
