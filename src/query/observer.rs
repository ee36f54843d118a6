use color_eyre::Result;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use super::client::QueryClient;
use super::entry::{Entry, Fetcher};
use super::key::QueryKey;
use super::options::ResolvedOptions;
use super::state::{QueryState, QueryStatus};
use super::QueryValue;

/// A consumer's handle on one cache entry.
///
/// Creating an observer subscribes to the entry for its key and fetches if
/// needed; dropping it unsubscribes. The in-flight fetch is never aborted on
/// drop since other observers may be waiting on it. When the last observer
/// goes, the entry is evicted after its retain time.
pub struct QueryObserver<T: QueryValue> {
  client: QueryClient,
  entry: Arc<Entry<T>>,
  receiver: watch::Receiver<QueryState<T>>,
  options: ResolvedOptions,
  /// Data carried over from the previous key while the new key loads
  previous: Option<T>,
}

impl<T: QueryValue> QueryObserver<T> {
  pub(crate) fn new(
    client: QueryClient,
    key: QueryKey,
    fetcher: Fetcher<T>,
    options: ResolvedOptions,
  ) -> Self {
    let entry = client.attach(&key, fetcher, &options);
    let receiver = entry.subscribe();
    if options.enabled {
      entry.ensure();
    }

    Self {
      client,
      entry,
      receiver,
      options,
      previous: None,
    }
  }

  pub fn key(&self) -> &QueryKey {
    self.entry.key()
  }

  pub fn is_enabled(&self) -> bool {
    self.options.enabled
  }

  /// Current state. While a keep-previous-data switch is pending, `data`
  /// holds the previous key's value and `is_previous_data` is set.
  pub fn state(&self) -> QueryState<T> {
    let mut state = self.receiver.borrow().clone();
    if state.data.is_none() {
      if let Some(previous) = &self.previous {
        state.data = Some(previous.clone());
        state.is_previous_data = true;
        if state.status == QueryStatus::Loading {
          state.status = QueryStatus::Success;
        }
      }
    }
    state
  }

  pub fn data(&self) -> Option<T> {
    self.state().data
  }

  pub fn status(&self) -> QueryStatus {
    self.state().status
  }

  pub fn is_loading(&self) -> bool {
    self.status() == QueryStatus::Loading
  }

  pub fn is_fetching(&self) -> bool {
    self.receiver.borrow().is_fetching
  }

  pub fn is_error(&self) -> bool {
    self.status() == QueryStatus::Error
  }

  /// Refetch regardless of staleness, superseding any in-flight fetch.
  /// Does nothing while the observer is disabled.
  pub fn refetch(&self) {
    if self.options.enabled {
      self.entry.refetch();
    }
  }

  /// Check for a state change without blocking.
  ///
  /// Returns `true` if the state changed since the last poll.
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let changed = self.receiver.has_changed().unwrap_or(false);
    if changed {
      self.receiver.borrow_and_update();
      self.drop_settled_previous();
    }
    changed
  }

  /// Wait for the next state change.
  pub async fn changed(&mut self) {
    // The entry (and its sender) lives as long as this observer holds it
    let _ = self.receiver.changed().await;
    self.drop_settled_previous();
  }

  /// Wait until no fetch is running and return the settled state.
  /// Returns immediately for a disabled observer.
  pub async fn wait_settled(&mut self) -> QueryState<T> {
    loop {
      if !self.receiver.borrow_and_update().is_fetching || !self.options.enabled {
        self.drop_settled_previous();
        return self.state();
      }
      if self.receiver.changed().await.is_err() {
        return self.state();
      }
    }
  }

  /// Move to a new key. With keep-previous-data the current data stays
  /// visible until the new key has data of its own.
  pub fn set_key<F, Fut>(&mut self, key: QueryKey, fetch: F)
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    if &key == self.key() {
      return;
    }

    let previous = if self.options.keep_previous_data {
      self.state().data
    } else {
      None
    };

    let fetcher: Fetcher<T> = Arc::new(move || fetch().boxed());
    let entry = self.client.attach(&key, fetcher, &self.options);
    self.release();
    self.receiver = entry.subscribe();
    self.entry = entry;
    self.previous = previous;
    self.drop_settled_previous();

    if self.options.enabled {
      self.entry.ensure();
    }
  }

  /// Enable or disable fetching. Enabling fetches if the data is missing
  /// or stale.
  pub fn set_enabled(&mut self, enabled: bool) {
    if self.options.enabled == enabled {
      return;
    }
    self.options.enabled = enabled;
    self.entry.set_active(enabled);
    if enabled {
      self.entry.ensure();
    }
  }

  fn drop_settled_previous(&mut self) {
    if self.previous.is_some() && self.receiver.borrow().data.is_some() {
      self.previous = None;
    }
  }

  fn release(&self) {
    if let Some((epoch, retain_time)) = self.entry.detach(self.options.enabled) {
      self
        .client
        .schedule_eviction(self.key().clone(), epoch, retain_time);
    }
  }
}

impl<T: QueryValue> Drop for QueryObserver<T> {
  fn drop(&mut self) {
    self.release();
  }
}

impl<T: QueryValue + std::fmt::Debug> std::fmt::Debug for QueryObserver<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryObserver")
      .field("key", self.key())
      .field("state", &self.state())
      .field("enabled", &self.options.enabled)
      .finish_non_exhaustive()
  }
}
