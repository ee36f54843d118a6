//! REST entities bound to the query cache.
//!
//! Every entity shares one key layout:
//! - `[name]` is the prefix mutations invalidate
//! - `[name, "list", search]` holds one page of search results
//! - `[name, "detail", id]` holds one record
//!
//! Server rows are run through [`Resource::normalize`], a total function,
//! so the rest of the app never sees a missing field.

mod client;
mod item;
pub mod normalize;
mod payment_type;
mod supplier;

pub use client::ResourceClient;
pub use item::Item;
pub use payment_type::PaymentType;
pub use supplier::Supplier;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::api::parse_list;
use crate::query::QueryValue;

/// A backend entity.
pub trait Resource: QueryValue + PartialEq + fmt::Debug {
  /// Root of every cache key for this entity
  const NAME: &'static str;
  /// Endpoint relative to the API base URL
  const PATH: &'static str;
  /// Plural, for titles
  const LABEL: &'static str;
  /// Table headers, in the order of [`Resource::cells`]
  const COLUMNS: &'static [&'static str];

  /// Build a row from whatever the server sent. Never fails.
  fn normalize(raw: &Value) -> Self;

  fn id(&self) -> Option<i64>;

  fn title(&self) -> &str;

  fn cells(&self) -> Vec<String>;

  /// Label/value pairs for the detail view.
  fn fields(&self) -> Vec<(&'static str, String)>;

  /// Request body for creating a record from just a name.
  fn create_body(name: &str) -> Value {
    json!({ "name": name })
  }
}

/// One page of normalized rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<R> {
  pub rows: Vec<R>,
  /// Server-side total; equals `rows.len()` when the server sends none
  pub total: u64,
}

impl<R> Default for ListPage<R> {
  fn default() -> Self {
    Self {
      rows: Vec::new(),
      total: 0,
    }
  }
}

impl<R> ListPage<R> {
  pub fn from_value(value: &Value, normalize: impl Fn(&Value) -> R) -> Self {
    let envelope = parse_list(value);
    Self {
      rows: envelope.rows.iter().map(normalize).collect(),
      total: envelope.total,
    }
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }
}

/// The bundled entities, for picking a screen from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum EntityKind {
  #[default]
  Item,
  PaymentType,
  Supplier,
}

impl EntityKind {
  pub fn label(self) -> &'static str {
    match self {
      EntityKind::Item => Item::LABEL,
      EntityKind::PaymentType => PaymentType::LABEL,
      EntityKind::Supplier => Supplier::LABEL,
    }
  }

  /// Next entity, wrapping around.
  pub fn next(self) -> Self {
    match self {
      EntityKind::Item => EntityKind::PaymentType,
      EntityKind::PaymentType => EntityKind::Supplier,
      EntityKind::Supplier => EntityKind::Item,
    }
  }
}
