//! Structured logging to a daily rolling file.
//!
//! The terminal belongs to the dashboard, so nothing is written to stdout.
//! The filter comes from `TERNAK_LOG` (same syntax as `RUST_LOG`).

use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const LOG_ENV: &str = "TERNAK_LOG";
const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. Logs go to `dir`, or to the default data
/// directory when `None`. Keep the returned guard alive until exit so
/// buffered lines are flushed.
pub fn init(dir: Option<&Path>) -> Result<WorkerGuard> {
  let dir = match dir {
    Some(dir) => dir.to_path_buf(),
    None => default_dir()?,
  };
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, "ternak.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let file = fmt::layer()
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true);

  Registry::default()
    .with(filter())
    .with(file)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  tracing::info!(dir = %dir.display(), "logging initialized");
  Ok(guard)
}

fn filter() -> EnvFilter {
  EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn default_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("ternak").join("logs"))
}
