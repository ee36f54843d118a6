use color_eyre::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff retry for query fetches.
///
/// Queries retry twice by default. Mutations never retry: a write that
/// failed halfway is not assumed safe to repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
  /// Retries after the first attempt; 0 disables retrying
  pub max_retries: u32,
  pub initial_backoff: Duration,
  pub max_backoff: Duration,
  pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 2,
      initial_backoff: Duration::from_millis(200),
      max_backoff: Duration::from_secs(5),
      backoff_multiplier: 2.0,
    }
  }
}

impl RetryPolicy {
  /// A policy that gives up after the first failure.
  pub fn none() -> Self {
    Self {
      max_retries: 0,
      ..Self::default()
    }
  }

  /// Delay before retry number `attempt` (0-based).
  pub fn backoff_for(&self, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
    if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
      return self.max_backoff;
    }
    Duration::from_secs_f64(secs.max(0.0))
  }

  /// Run `op` until it succeeds or retries are exhausted.
  /// The last error is returned unchanged.
  pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let mut attempt = 0;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(e) if attempt < self.max_retries => {
          let delay = self.backoff_for(attempt);
          attempt += 1;
          warn!(attempt, ?delay, error = %e, "fetch failed, retrying");
          tokio::time::sleep(delay).await;
        }
        Err(e) => return Err(e),
      }
    }
  }
}
