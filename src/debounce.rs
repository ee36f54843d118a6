//! Debounced values for search-as-you-type inputs.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Default quiet period before a value settles.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// A value whose changes only propagate after `delay` without further change.
///
/// `immediate` tracks every `set`; `settled` follows once the input has been
/// quiet for the full delay. Dropping the value cancels a pending settle.
/// Timers run on the Tokio runtime, so `set` must be called inside one.
pub struct Debounced<T> {
  immediate: T,
  delay: Duration,
  settled: Arc<watch::Sender<T>>,
  receiver: watch::Receiver<T>,
  pending: Option<JoinHandle<()>>,
}

impl<T> Debounced<T>
where
  T: Clone + PartialEq + Send + Sync + 'static,
{
  pub fn new(initial: T, delay: Duration) -> Self {
    let (settled, receiver) = watch::channel(initial.clone());
    Self {
      immediate: initial,
      delay,
      settled: Arc::new(settled),
      receiver,
      pending: None,
    }
  }

  pub fn delay(&self) -> Duration {
    self.delay
  }

  /// Latest raw value.
  pub fn immediate(&self) -> &T {
    &self.immediate
  }

  /// Value as of the last quiet period.
  pub fn settled(&self) -> T {
    self.settled.borrow().clone()
  }

  /// Receiver notified each time the settled value changes.
  pub fn subscribe(&self) -> watch::Receiver<T> {
    self.settled.subscribe()
  }

  /// Record a new raw value and restart the quiet period.
  pub fn set(&mut self, value: T) {
    self.cancel();
    self.immediate = value.clone();

    // Back to the settled value: nothing left to propagate
    if *self.settled.borrow() == value {
      return;
    }

    let deadline = Instant::now() + self.delay;
    let settled = Arc::clone(&self.settled);
    self.pending = Some(tokio::spawn(async move {
      sleep_until(deadline).await;
      settle(&settled, value);
    }));
  }

  /// Settle the current raw value now, skipping the remaining delay.
  pub fn flush(&mut self) {
    self.cancel();
    settle(&self.settled, self.immediate.clone());
  }

  /// Whether a change is waiting for its quiet period to end.
  pub fn is_pending(&self) -> bool {
    self
      .pending
      .as_ref()
      .is_some_and(|task| !task.is_finished())
  }

  /// The newly settled value, if it changed since the last poll.
  /// Call this in your event loop tick handler.
  pub fn poll_settled(&mut self) -> Option<T> {
    if self.receiver.has_changed().unwrap_or(false) {
      Some(self.receiver.borrow_and_update().clone())
    } else {
      None
    }
  }

  fn cancel(&mut self) {
    if let Some(task) = self.pending.take() {
      task.abort();
    }
  }
}

impl<T> Drop for Debounced<T> {
  fn drop(&mut self) {
    if let Some(task) = self.pending.take() {
      task.abort();
    }
  }
}

fn settle<T: PartialEq>(sender: &watch::Sender<T>, value: T) {
  sender.send_if_modified(|current| {
    if *current == value {
      return false;
    }
    *current = value;
    true
  });
}
