use color_eyre::Result;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::client::QueryClient;
use super::key::QueryKey;
use super::state::QueryError;

type MutateFn<I, R> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<R>> + Send + Sync>;

/// Lifecycle status of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationStatus {
  #[default]
  Idle,
  Pending,
  Success,
  Error,
}

/// State of the most recently issued call.
#[derive(Debug, Clone)]
pub struct MutationState<R> {
  pub status: MutationStatus,
  pub data: Option<R>,
  pub error: Option<QueryError>,
}

impl<R> Default for MutationState<R> {
  fn default() -> Self {
    Self {
      status: MutationStatus::Idle,
      data: None,
      error: None,
    }
  }
}

impl<R> MutationState<R> {
  pub fn is_pending(&self) -> bool {
    self.status == MutationStatus::Pending
  }

  pub fn is_success(&self) -> bool {
    self.status == MutationStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == MutationStatus::Error
  }
}

/// A write operation bound to the cache.
///
/// On success every declared key prefix is invalidated, so observed list
/// and detail queries refetch without the caller asking. On failure nothing
/// is invalidated. Calls are not serialized with each other; the published
/// state always describes the latest call.
pub struct Mutation<I, R> {
  client: QueryClient,
  mutate: MutateFn<I, R>,
  invalidates: Vec<QueryKey>,
  state: Arc<watch::Sender<MutationState<R>>>,
  calls: Arc<AtomicU64>,
}

impl<I, R> Clone for Mutation<I, R> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      mutate: Arc::clone(&self.mutate),
      invalidates: self.invalidates.clone(),
      state: Arc::clone(&self.state),
      calls: Arc::clone(&self.calls),
    }
  }
}

impl<I, R> Mutation<I, R>
where
  I: Send + 'static,
  R: Clone + Send + Sync + 'static,
{
  pub(crate) fn new<F>(client: QueryClient, mutate: F) -> Self
  where
    F: Fn(I) -> BoxFuture<'static, Result<R>> + Send + Sync + 'static,
  {
    let (state, _) = watch::channel(MutationState::default());
    Self {
      client,
      mutate: Arc::new(mutate),
      invalidates: Vec::new(),
      state: Arc::new(state),
      calls: Arc::new(AtomicU64::new(0)),
    }
  }

  /// Invalidate every query under `prefix` after a successful call.
  pub fn invalidates(mut self, prefix: QueryKey) -> Self {
    self.invalidates.push(prefix);
    self
  }

  pub fn state(&self) -> MutationState<R> {
    self.state.borrow().clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<MutationState<R>> {
    self.state.subscribe()
  }

  /// Return to `Idle`, e.g. once the UI has shown the outcome.
  pub fn reset(&self) {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.state.send_replace(MutationState::default());
  }

  /// Run the mutation and wait for it.
  pub async fn mutate(&self, input: I) -> std::result::Result<R, QueryError> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    self.publish(call, |state| {
      state.status = MutationStatus::Pending;
      state.error = None;
    });

    match (self.mutate)(input).await {
      Ok(data) => {
        for prefix in &self.invalidates {
          self.client.invalidate_queries(prefix);
        }
        info!(targets = self.invalidates.len(), "mutation succeeded");
        let published = data.clone();
        self.publish(call, move |state| {
          state.status = MutationStatus::Success;
          state.data = Some(published);
          state.error = None;
        });
        Ok(data)
      }
      Err(report) => {
        let error = QueryError::from_report(&report);
        warn!(%error, "mutation failed");
        let published = error.clone();
        self.publish(call, move |state| {
          state.status = MutationStatus::Error;
          state.error = Some(published);
        });
        Err(error)
      }
    }
  }

  /// Run the mutation on a background task.
  pub fn spawn(&self, input: I) -> JoinHandle<std::result::Result<R, QueryError>> {
    let mutation = self.clone();
    tokio::spawn(async move { mutation.mutate(input).await })
  }

  /// Apply `update` only if `call` is still the latest call.
  fn publish(&self, call: u64, update: impl FnOnce(&mut MutationState<R>)) {
    self.state.send_if_modified(|state| {
      if self.calls.load(Ordering::SeqCst) != call {
        return false;
      }
      update(state);
      true
    });
  }
}
