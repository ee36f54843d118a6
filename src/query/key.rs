//! Structured cache keys.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// One primitive segment of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum KeyPart {
  Null,
  Int(i64),
  Str(String),
}

impl From<&str> for KeyPart {
  fn from(value: &str) -> Self {
    KeyPart::Str(value.to_string())
  }
}

impl From<String> for KeyPart {
  fn from(value: String) -> Self {
    KeyPart::Str(value)
  }
}

impl From<&String> for KeyPart {
  fn from(value: &String) -> Self {
    KeyPart::Str(value.clone())
  }
}

impl From<i64> for KeyPart {
  fn from(value: i64) -> Self {
    KeyPart::Int(value)
  }
}

impl From<i32> for KeyPart {
  fn from(value: i32) -> Self {
    KeyPart::Int(i64::from(value))
  }
}

impl From<u32> for KeyPart {
  fn from(value: u32) -> Self {
    KeyPart::Int(i64::from(value))
  }
}

impl From<u64> for KeyPart {
  fn from(value: u64) -> Self {
    KeyPart::Int(i64::try_from(value).unwrap_or(i64::MAX))
  }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
  fn from(value: Option<T>) -> Self {
    value.map(Into::into).unwrap_or(KeyPart::Null)
  }
}

/// Ordered sequence of primitives identifying one cached query.
///
/// Structurally equal keys resolve to the same cache entry. Keys are built
/// from the most general segment to the most specific one, so a prefix
/// (e.g. `["item"]`) addresses every list and detail query of an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a segment.
  pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
    self.0.push(part.into());
    self
  }

  pub fn parts(&self) -> &[KeyPart] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// True if `prefix` matches the leading segments of this key.
  /// The empty key is a prefix of every key.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.0.starts_with(&prefix.0)
  }

  /// Canonical JSON form, e.g. `["item","list",""]`.
  pub fn canonical(&self) -> String {
    serde_json::to_string(&self.0).unwrap_or_default()
  }

  /// SHA256 of the canonical form, for stable fixed-length storage keys.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.canonical().as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.canonical())
  }
}

/// Build a [`QueryKey`] from a list of segments.
///
/// ```
/// use ternak::query_key;
///
/// let key = query_key!["item", "detail", Some(7)];
/// assert_eq!(key.to_string(), r#"["item","detail",7]"#);
/// ```
#[macro_export]
macro_rules! query_key {
  ($($part:expr),* $(,)?) => {
    $crate::query::QueryKey::new()$(.with($part))*
  };
}
