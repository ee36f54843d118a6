use std::time::Duration;

use super::retry::RetryPolicy;

/// Client-wide defaults applied when a query leaves an option unset.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDefaults {
  /// How long fetched data counts as fresh
  pub stale_time: Duration,
  /// How long an entry without observers is kept before eviction
  pub retain_time: Duration,
  pub retry: RetryPolicy,
}

impl Default for QueryDefaults {
  fn default() -> Self {
    Self {
      stale_time: Duration::from_secs(30),
      retain_time: Duration::from_secs(300),
      retry: RetryPolicy::default(),
    }
  }
}

/// Per-query options.
#[derive(Debug, Clone)]
pub struct QueryOptions {
  /// When false the query never fetches (e.g. a detail query without an id)
  pub enabled: bool,
  pub stale_time: Option<Duration>,
  pub retain_time: Option<Duration>,
  /// Keep showing the previous key's data until the new key resolves
  pub keep_previous_data: bool,
  pub retry: Option<RetryPolicy>,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      enabled: true,
      stale_time: None,
      retain_time: None,
      keep_previous_data: false,
      retry: None,
    }
  }
}

impl QueryOptions {
  pub fn enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = Some(stale_time);
    self
  }

  pub fn retain_time(mut self, retain_time: Duration) -> Self {
    self.retain_time = Some(retain_time);
    self
  }

  pub fn keep_previous_data(mut self, keep: bool) -> Self {
    self.keep_previous_data = keep;
    self
  }

  pub fn retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = Some(retry);
    self
  }

  pub(crate) fn resolve(self, defaults: &QueryDefaults) -> ResolvedOptions {
    ResolvedOptions {
      enabled: self.enabled,
      stale_time: self.stale_time.unwrap_or(defaults.stale_time),
      retain_time: self.retain_time.unwrap_or(defaults.retain_time),
      keep_previous_data: self.keep_previous_data,
      retry: self.retry.unwrap_or_else(|| defaults.retry.clone()),
    }
  }
}

/// Options with every default filled in.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedOptions {
  pub enabled: bool,
  pub stale_time: Duration,
  pub retain_time: Duration,
  pub keep_previous_data: bool,
  pub retry: RetryPolicy,
}
