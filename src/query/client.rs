use color_eyre::Result;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::entry::{AnyEntry, Entry, Fetcher};
use super::key::QueryKey;
use super::mutation::Mutation;
use super::observer::QueryObserver;
use super::options::{QueryDefaults, QueryOptions, ResolvedOptions};
use super::state::{QueryError, QueryState};
use super::{lock, QueryValue};
use crate::persist::{NoopPersister, QueryPersister};

struct ClientInner {
  entries: Mutex<HashMap<QueryKey, Arc<dyn AnyEntry>>>,
  defaults: QueryDefaults,
  persister: Arc<dyn QueryPersister>,
}

/// The shared query cache.
///
/// Cloning is cheap and every clone addresses the same store. Create one per
/// application and hand clones to whatever needs it; tests create their own
/// isolated clients.
#[derive(Clone)]
pub struct QueryClient {
  inner: Arc<ClientInner>,
}

impl Default for QueryClient {
  fn default() -> Self {
    Self::new(QueryDefaults::default())
  }
}

impl QueryClient {
  /// Create a client without persistence.
  pub fn new(defaults: QueryDefaults) -> Self {
    Self::with_persister(defaults, Arc::new(NoopPersister))
  }

  /// Create a client that seeds new entries from, and writes successful
  /// results to, `persister`.
  pub fn with_persister(defaults: QueryDefaults, persister: Arc<dyn QueryPersister>) -> Self {
    Self {
      inner: Arc::new(ClientInner {
        entries: Mutex::new(HashMap::new()),
        defaults,
        persister,
      }),
    }
  }

  pub fn defaults(&self) -> &QueryDefaults {
    &self.inner.defaults
  }

  /// Observe `key`, fetching with `fetch` when the cached data is missing
  /// or stale. Observers of the same key share one entry and one in-flight
  /// fetch.
  pub fn query<T, F, Fut>(&self, key: QueryKey, fetch: F, options: QueryOptions) -> QueryObserver<T>
  where
    T: QueryValue,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let options = options.resolve(&self.inner.defaults);
    QueryObserver::new(self.clone(), key, into_fetcher(fetch), options)
  }

  /// Resolve `key` to a settled value: cached data if fresh, otherwise the
  /// result of a (shared) fetch.
  pub async fn fetch_query<T, F, Fut>(
    &self,
    key: QueryKey,
    fetch: F,
    options: QueryOptions,
  ) -> std::result::Result<T, QueryError>
  where
    T: QueryValue,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let mut observer = self.query(key, fetch, options.enabled(true));
    let state = observer.wait_settled().await;
    if state.is_error() {
      return Err(
        state
          .error
          .unwrap_or_else(|| QueryError::new("query failed")),
      );
    }
    state
      .data
      .ok_or_else(|| QueryError::new("query settled without data"))
  }

  /// Create a mutation. Declare the keys it affects with
  /// [`Mutation::invalidates`].
  pub fn mutation<I, R, F, Fut>(&self, mutate: F) -> Mutation<I, R>
  where
    I: Send + 'static,
    R: Clone + Send + Sync + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
  {
    Mutation::new(self.clone(), move |input| mutate(input).boxed())
  }

  /// Current data for `key`, if cached with type `T`.
  pub fn get_query_data<T: QueryValue>(&self, key: &QueryKey) -> Option<T> {
    self.get_query_state::<T>(key).and_then(|state| state.data)
  }

  /// Current state for `key`, if cached with type `T`.
  pub fn get_query_state<T: QueryValue>(&self, key: &QueryKey) -> Option<QueryState<T>> {
    let entry = lock(&self.inner.entries).get(key).cloned()?;
    entry
      .as_any()
      .downcast::<Entry<T>>()
      .ok()
      .map(|entry| entry.snapshot())
  }

  /// Write data for `key` directly, creating the entry if needed.
  /// Observers see it as a successful fetch. Without observers the entry
  /// is evicted after `retain_time` like any other unused entry.
  pub fn set_query_data<T: QueryValue>(&self, key: QueryKey, data: T) {
    let options = QueryOptions::default().resolve(&self.inner.defaults);
    let entry = {
      let mut entries = lock(&self.inner.entries);
      self.entry_locked::<T>(&mut entries, &key, &options)
    };
    entry.set_data(data);
    if let Some((epoch, retain_time)) = entry.retain_unobserved() {
      self.schedule_eviction(key, epoch, retain_time);
    }
  }

  /// Mark every entry whose key starts with `prefix` as stale. Entries with
  /// enabled observers refetch immediately; the rest refetch on next use.
  ///
  /// Returns the number of entries newly invalidated. Invalidating an
  /// already invalidated entry, or a prefix that matches nothing, is a no-op.
  pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
    let matching: Vec<Arc<dyn AnyEntry>> = lock(&self.inner.entries)
      .values()
      .filter(|entry| entry.key().starts_with(prefix))
      .cloned()
      .collect();

    let invalidated = matching
      .into_iter()
      .filter(|entry| Arc::clone(entry).invalidate())
      .count();
    info!(%prefix, invalidated, "invalidated queries");
    invalidated
  }

  /// Drop every entry whose key starts with `prefix`, along with any
  /// persisted snapshot. Attached observers keep their current state but
  /// are detached from the cache.
  pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
    let removed: Vec<QueryKey> = {
      let mut entries = lock(&self.inner.entries);
      let keys: Vec<QueryKey> = entries
        .keys()
        .filter(|key| key.starts_with(prefix))
        .cloned()
        .collect();
      for key in &keys {
        entries.remove(key);
      }
      keys
    };

    for key in &removed {
      if let Err(e) = self.inner.persister.remove(key) {
        warn!(%key, error = %e, "failed to remove persisted query");
      }
    }
    debug!(%prefix, removed = removed.len(), "removed queries");
    removed.len()
  }

  /// Number of entries currently cached.
  pub fn entry_count(&self) -> usize {
    lock(&self.inner.entries).len()
  }

  /// Get or create the entry for `key` and attach an observer to it.
  /// Attaching under the map lock keeps eviction from racing the attach.
  pub(crate) fn attach<T: QueryValue>(
    &self,
    key: &QueryKey,
    fetcher: Fetcher<T>,
    options: &ResolvedOptions,
  ) -> Arc<Entry<T>> {
    let mut entries = lock(&self.inner.entries);
    let entry = self.entry_locked::<T>(&mut entries, key, options);
    entry.attach(fetcher, options);
    entry
  }

  fn entry_locked<T: QueryValue>(
    &self,
    entries: &mut HashMap<QueryKey, Arc<dyn AnyEntry>>,
    key: &QueryKey,
    options: &ResolvedOptions,
  ) -> Arc<Entry<T>> {
    if let Some(existing) = entries.get(key) {
      match Arc::clone(existing).as_any().downcast::<Entry<T>>() {
        Ok(entry) => return entry,
        Err(_) => warn!(%key, "key reused with a different value type, replacing entry"),
      }
    }

    debug!(%key, "creating cache entry");
    let entry = Entry::<T>::new(key.clone(), options, Arc::clone(&self.inner.persister));
    entries.insert(key.clone(), entry.clone());
    entry
  }

  /// Evict `key` after `retain_time` unless an observer attaches meanwhile.
  pub(crate) fn schedule_eviction(&self, key: QueryKey, epoch: u64, retain_time: Duration) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      // Outside a runtime the entry simply stays until removed
      return;
    };
    let inner: Weak<ClientInner> = Arc::downgrade(&self.inner);
    runtime.spawn(async move {
      tokio::time::sleep(retain_time).await;
      if let Some(inner) = inner.upgrade() {
        evict_if_unused(&inner, &key, epoch);
      }
    });
  }
}

fn evict_if_unused(inner: &ClientInner, key: &QueryKey, epoch: u64) {
  let mut entries = lock(&inner.entries);
  let unused = entries
    .get(key)
    .is_some_and(|entry| entry.subscribers() == 0 && entry.gc_epoch() == epoch);
  if unused {
    entries.remove(key);
    debug!(%key, "evicted unused cache entry");
  }
}

fn into_fetcher<T, F, Fut>(fetch: F) -> Fetcher<T>
where
  T: QueryValue,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T>> + Send + 'static,
{
  Arc::new(move || fetch().boxed())
}

impl std::fmt::Debug for QueryClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryClient")
      .field("entries", &self.entry_count())
      .field("defaults", &self.inner.defaults)
      .finish_non_exhaustive()
  }
}
