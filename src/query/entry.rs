//! A single cache entry: the published state for one key plus the
//! bookkeeping that drives fetching, dedup and eviction.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::key::QueryKey;
use super::options::ResolvedOptions;
use super::retry::RetryPolicy;
use super::state::{QueryError, QueryState, QueryStatus};
use super::{lock, QueryValue};
use crate::persist::{PersistedQuery, QueryPersister};

/// Factory producing one fetch per call.
pub(crate) type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

struct EntryMeta<T> {
  fetcher: Option<Fetcher<T>>,
  stale_time: Duration,
  retain_time: Duration,
  retry: RetryPolicy,
  /// Bumped on every fetch start; only the latest generation may settle
  generation: u64,
  in_flight: Option<JoinHandle<()>>,
  fetched_at: Option<Instant>,
  invalidated: bool,
  /// Observers attached to this entry
  subscribers: usize,
  /// Observers attached with `enabled = true`
  active: usize,
  /// Bumped on every attach so a pending eviction can tell it is outdated
  gc_epoch: u64,
}

impl<T> EntryMeta<T> {
  fn is_fetching(&self) -> bool {
    self.in_flight.as_ref().is_some_and(|task| !task.is_finished())
  }
}

pub(crate) struct Entry<T> {
  key: QueryKey,
  state: watch::Sender<QueryState<T>>,
  meta: Mutex<EntryMeta<T>>,
  persister: Arc<dyn QueryPersister>,
}

impl<T: QueryValue> Entry<T> {
  pub(crate) fn new(
    key: QueryKey,
    options: &ResolvedOptions,
    persister: Arc<dyn QueryPersister>,
  ) -> Arc<Self> {
    let state = match restore(&key, persister.as_ref()) {
      Some((data, persisted)) => QueryState {
        data: Some(data),
        status: QueryStatus::Success,
        updated_at: Some(persisted.cached_at),
        is_restored: true,
        ..QueryState::default()
      },
      None => QueryState::default(),
    };
    let (state, _) = watch::channel(state);

    Arc::new(Self {
      key,
      state,
      meta: Mutex::new(EntryMeta {
        fetcher: None,
        stale_time: options.stale_time,
        retain_time: options.retain_time,
        retry: options.retry.clone(),
        generation: 0,
        in_flight: None,
        // Restored data is never fresh
        fetched_at: None,
        invalidated: false,
        subscribers: 0,
        active: 0,
        gc_epoch: 0,
      }),
      persister,
    })
  }

  pub(crate) fn key(&self) -> &QueryKey {
    &self.key
  }

  pub(crate) fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
    self.state.subscribe()
  }

  pub(crate) fn snapshot(&self) -> QueryState<T> {
    self.state.borrow().clone()
  }

  /// Register an observer. The newest observer's fetcher and timings win.
  pub(crate) fn attach(&self, fetcher: Fetcher<T>, options: &ResolvedOptions) {
    let mut meta = lock(&self.meta);
    meta.fetcher = Some(fetcher);
    meta.stale_time = options.stale_time;
    meta.retain_time = options.retain_time;
    meta.retry = options.retry.clone();
    meta.subscribers += 1;
    if options.enabled {
      meta.active += 1;
    }
    meta.gc_epoch += 1;
  }

  /// Restart the retain window of an entry nobody observes. Returns the
  /// eviction epoch and delay, or `None` while observers are attached.
  pub(crate) fn retain_unobserved(&self) -> Option<(u64, Duration)> {
    let mut meta = lock(&self.meta);
    if meta.subscribers > 0 {
      return None;
    }
    meta.gc_epoch += 1;
    Some((meta.gc_epoch, meta.retain_time))
  }

  /// Unregister an observer. Returns the eviction epoch and delay when it
  /// was the last one.
  pub(crate) fn detach(&self, was_active: bool) -> Option<(u64, Duration)> {
    let mut meta = lock(&self.meta);
    meta.subscribers = meta.subscribers.saturating_sub(1);
    if was_active {
      meta.active = meta.active.saturating_sub(1);
    }
    (meta.subscribers == 0).then_some((meta.gc_epoch, meta.retain_time))
  }

  pub(crate) fn set_active(&self, active: bool) {
    let mut meta = lock(&self.meta);
    if active {
      meta.active += 1;
    } else {
      meta.active = meta.active.saturating_sub(1);
    }
  }

  /// Start a fetch if the data is missing, stale or invalidated and no
  /// fetch is already running for this key.
  pub(crate) fn ensure(self: &Arc<Self>) {
    let mut meta = lock(&self.meta);
    if meta.is_fetching() {
      debug!(key = %self.key, "joining in-flight fetch");
      return;
    }
    let stale = meta.invalidated
      || meta
        .fetched_at
        .map(|t| t.elapsed() > meta.stale_time)
        .unwrap_or(true);
    if stale {
      self.start_fetch(&mut meta);
    }
  }

  /// Start a fetch regardless of staleness, superseding any in-flight one.
  pub(crate) fn refetch(self: &Arc<Self>) {
    let mut meta = lock(&self.meta);
    self.start_fetch(&mut meta);
  }

  /// Replace the data directly, as if a fetch had just succeeded.
  /// Any in-flight fetch is superseded.
  pub(crate) fn set_data(&self, data: T) {
    let mut meta = lock(&self.meta);
    meta.generation += 1;
    if let Some(task) = meta.in_flight.take() {
      task.abort();
    }
    meta.fetched_at = Some(Instant::now());
    meta.invalidated = false;
    let persisted = self.serialize(&data);
    self.state.send_modify(|state| {
      state.data = Some(data);
      state.status = QueryStatus::Success;
      state.error = None;
      state.is_fetching = false;
      state.updated_at = Some(Utc::now());
      state.is_restored = false;
    });
    drop(meta);
    self.persist(persisted);
  }

  fn start_fetch(self: &Arc<Self>, meta: &mut EntryMeta<T>) {
    let Some(fetcher) = meta.fetcher.clone() else {
      return;
    };

    meta.generation += 1;
    let generation = meta.generation;
    if let Some(superseded) = meta.in_flight.take() {
      debug!(key = %self.key, generation, "superseding in-flight fetch");
      superseded.abort();
    }

    self.state.send_modify(|state| {
      state.is_fetching = true;
      if state.data.is_none() {
        state.status = QueryStatus::Loading;
        state.error = None;
      }
    });

    debug!(key = %self.key, generation, "fetch started");
    let retry = meta.retry.clone();
    let entry = Arc::clone(self);
    meta.in_flight = Some(tokio::spawn(async move {
      let result = AssertUnwindSafe(retry.run(|| fetcher()))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(eyre!("query function panicked")));
      entry.settle(generation, result);
    }));
  }

  fn settle(&self, generation: u64, result: Result<T>) {
    let mut meta = lock(&self.meta);
    if generation != meta.generation {
      debug!(key = %self.key, generation, "discarding superseded response");
      return;
    }
    meta.in_flight = None;

    let persisted = match result {
      Ok(data) => {
        meta.fetched_at = Some(Instant::now());
        meta.invalidated = false;
        let persisted = self.serialize(&data);
        self.state.send_modify(|state| {
          state.data = Some(data);
          state.status = QueryStatus::Success;
          state.error = None;
          state.is_fetching = false;
          state.updated_at = Some(Utc::now());
          state.is_restored = false;
        });
        debug!(key = %self.key, generation, "fetch succeeded");
        persisted
      }
      Err(report) => {
        let error = QueryError::from_report(&report);
        warn!(key = %self.key, generation, %error, "fetch failed");
        self.state.send_modify(|state| {
          state.status = QueryStatus::Error;
          state.error = Some(error);
          state.is_fetching = false;
        });
        None
      }
    };
    drop(meta);
    self.persist(persisted);
  }

  fn serialize(&self, data: &T) -> Option<serde_json::Value> {
    if !self.persister.is_enabled() {
      return None;
    }
    serde_json::to_value(data)
      .map_err(|e| warn!(key = %self.key, error = %e, "failed to serialize query data"))
      .ok()
  }

  fn persist(&self, value: Option<serde_json::Value>) {
    if let Some(value) = value {
      if let Err(e) = self.persister.persist(&self.key, &value) {
        warn!(key = %self.key, error = %e, "failed to persist query data");
      }
    }
  }
}

/// Type-erased view of an entry, as held by the client's map.
pub(crate) trait AnyEntry: Send + Sync {
  fn key(&self) -> &QueryKey;

  fn subscribers(&self) -> usize;

  fn gc_epoch(&self) -> u64;

  /// Mark stale; refetch now if enabled observers are attached.
  /// Returns false if the entry was already invalidated and either nobody
  /// observes it or the refetch for that invalidation is still running.
  fn invalidate(self: Arc<Self>) -> bool;

  fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: QueryValue> AnyEntry for Entry<T> {
  fn key(&self) -> &QueryKey {
    &self.key
  }

  fn subscribers(&self) -> usize {
    lock(&self.meta).subscribers
  }

  fn gc_epoch(&self) -> u64 {
    lock(&self.meta).gc_epoch
  }

  fn invalidate(self: Arc<Self>) -> bool {
    let mut meta = lock(&self.meta);
    if meta.invalidated && (meta.active == 0 || meta.is_fetching()) {
      return false;
    }
    meta.invalidated = true;
    if meta.active > 0 {
      debug!(key = %self.key, "invalidated, refetching");
      self.start_fetch(&mut meta);
    } else {
      debug!(key = %self.key, "invalidated");
    }
    true
  }

  fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
    self
  }
}

fn restore<T: QueryValue>(
  key: &QueryKey,
  persister: &dyn QueryPersister,
) -> Option<(T, PersistedQuery)> {
  if !persister.is_enabled() {
    return None;
  }
  let persisted = match persister.restore(key) {
    Ok(found) => found?,
    Err(e) => {
      warn!(%key, error = %e, "failed to read persisted query");
      return None;
    }
  };
  match serde_json::from_value(persisted.value.clone()) {
    Ok(data) => {
      debug!(%key, "restored persisted query");
      Some((data, persisted))
    }
    Err(e) => {
      warn!(%key, error = %e, "persisted query has an incompatible shape");
      None
    }
  }
}
