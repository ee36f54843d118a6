use chrono::{DateTime, Utc};
use color_eyre::Report;
use std::fmt;
use std::sync::Arc;

/// Lifecycle status of a cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
  /// No fetch has been attempted
  #[default]
  Idle,
  /// First fetch in progress, no data yet
  Loading,
  /// Data is available
  Success,
  /// The last fetch failed
  Error,
}

/// A fetch or mutation failure, shared between every observer of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
  message: Arc<str>,
}

impl QueryError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: Arc::from(message.into()),
    }
  }

  /// Render a report with its full cause chain.
  pub fn from_report(report: &Report) -> Self {
    Self::new(format!("{:#}", report))
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

impl fmt::Display for QueryError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.message)
  }
}

impl std::error::Error for QueryError {}

/// Snapshot of a query as seen by an observer.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
  /// Last successfully fetched value
  pub data: Option<T>,
  pub status: QueryStatus,
  /// Present only while `status` is `Error`
  pub error: Option<QueryError>,
  /// A fetch is running for this key (initial load or background refresh)
  pub is_fetching: bool,
  /// Wall-clock time of the data currently held
  pub updated_at: Option<DateTime<Utc>>,
  /// Data was seeded from the persisted snapshot and not yet refreshed
  pub is_restored: bool,
  /// Data belongs to the observer's previous key (keep-previous-data)
  pub is_previous_data: bool,
}

impl<T> Default for QueryState<T> {
  fn default() -> Self {
    Self {
      data: None,
      status: QueryStatus::Idle,
      error: None,
      is_fetching: false,
      updated_at: None,
      is_restored: false,
      is_previous_data: false,
    }
  }
}

impl<T> QueryState<T> {
  pub fn is_idle(&self) -> bool {
    self.status == QueryStatus::Idle
  }

  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Loading
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }

  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_ref().map(QueryError::message)
  }
}
