//! Keyed query cache, inspired by TanStack Query.
//!
//! A [`QueryClient`] owns every cache entry. Components read data through a
//! [`QueryObserver`], which attaches to the entry for its key, triggers a
//! fetch when the data is missing or stale, and exposes the entry's
//! [`QueryState`]. Writes go through a [`Mutation`], which invalidates the
//! key prefixes it declares once it succeeds.
//!
//! # Example
//!
//! ```ignore
//! let client = QueryClient::default();
//! let api = api.clone();
//! let mut items = client.query(
//!   query_key!["item", "list", ""],
//!   move || {
//!     let api = api.clone();
//!     async move { api.list_items("").await }
//!   },
//!   QueryOptions::default(),
//! );
//!
//! // In the event loop tick
//! if items.poll() {
//!   // State changed, trigger re-render
//! }
//!
//! // In render
//! let state = items.state();
//! match state.status {
//!   QueryStatus::Loading => render_spinner(),
//!   QueryStatus::Success => render_rows(state.data()),
//!   QueryStatus::Error => render_error(state.error()),
//!   QueryStatus::Idle => {}
//! }
//! ```
//!
//! Every fetch runs on a spawned task, so queries must be created inside a
//! Tokio runtime.

mod client;
mod entry;
mod key;
mod mutation;
mod observer;
mod options;
mod retry;
mod state;

#[cfg(test)]
mod tests;

pub use client::QueryClient;
pub use key::{KeyPart, QueryKey};
pub use mutation::{Mutation, MutationState, MutationStatus};
pub use observer::QueryObserver;
pub use options::{QueryDefaults, QueryOptions};
pub use retry::RetryPolicy;
pub use state::{QueryError, QueryState, QueryStatus};

use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Requirements for a value stored in the cache.
///
/// Values are cloned out to every observer and serialized when a persister
/// is configured.
pub trait QueryValue: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}
impl<T> QueryValue for T where T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// Lock a mutex, recovering the data if a holder panicked.
/// No invariant spans a panic point in this module.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
