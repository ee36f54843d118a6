//! Optional on-disk snapshot of successful query results.
//!
//! When an entry is created and a snapshot exists for its key, the entry is
//! seeded with the snapshot and refetched straight away. If the backend is
//! unreachable the seeded data stays visible (offline mode).

mod storage;

pub use storage::SqlitePersister;

use chrono::{DateTime, Utc};
use color_eyre::Result;

use crate::query::QueryKey;

/// A stored query result.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedQuery {
  /// The cached value as JSON
  pub value: serde_json::Value,
  /// When the value was stored
  pub cached_at: DateTime<Utc>,
}

/// Storage backend for query snapshots.
pub trait QueryPersister: Send + Sync {
  /// Load the snapshot for a key.
  fn restore(&self, key: &QueryKey) -> Result<Option<PersistedQuery>>;

  /// Store (or replace) the snapshot for a key.
  fn persist(&self, key: &QueryKey, value: &serde_json::Value) -> Result<()>;

  /// Drop the snapshot for a key.
  fn remove(&self, key: &QueryKey) -> Result<()>;

  /// False for backends that store nothing, letting callers skip serialization.
  fn is_enabled(&self) -> bool {
    true
  }
}

/// Persister that doesn't store anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopPersister;

impl QueryPersister for NoopPersister {
  fn restore(&self, _key: &QueryKey) -> Result<Option<PersistedQuery>> {
    Ok(None)
  }

  fn persist(&self, _key: &QueryKey, _value: &serde_json::Value) -> Result<()> {
    Ok(())
  }

  fn remove(&self, _key: &QueryKey) -> Result<()> {
    Ok(())
  }

  fn is_enabled(&self) -> bool {
    false
  }
}
