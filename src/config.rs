use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::query::{QueryDefaults, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the backend, e.g. "https://backend.example.com/api"
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub stale_time_secs: u64,
  pub retain_time_secs: u64,
  pub debounce_ms: u64,
  /// Keep successful results in a local SQLite file for offline startup
  pub persist: bool,
  pub retry: RetryConfig,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_time_secs: 30,
      retain_time_secs: 300,
      debounce_ms: 300,
      persist: false,
      retry: RetryConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub max_retries: u32,
  pub initial_backoff_ms: u64,
  pub max_backoff_ms: u64,
  pub multiplier: f64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 2,
      initial_backoff_ms: 200,
      max_backoff_ms: 5000,
      multiplier: 2.0,
    }
  }
}

impl RetryConfig {
  pub fn policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_retries: self.max_retries,
      initial_backoff: Duration::from_millis(self.initial_backoff_ms),
      max_backoff: Duration::from_millis(self.max_backoff_ms),
      backoff_multiplier: self.multiplier,
    }
  }
}

impl CacheConfig {
  pub fn query_defaults(&self) -> QueryDefaults {
    QueryDefaults {
      stale_time: Duration::from_secs(self.stale_time_secs),
      retain_time: Duration::from_secs(self.retain_time_secs),
      retry: self.retry.policy(),
    }
  }

  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./ternak.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ternak/config.yaml
  /// 4. ~/.config/ternak/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/ternak/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("ternak.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("ternak").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  /// Parse and validate a YAML document.
  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    let url = url::Url::parse(&self.api.url)
      .map_err(|e| eyre!("api.url '{}' is not a valid URL: {}", self.api.url, e))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(eyre!("api.url must use http or https, got '{}'", url.scheme()));
    }
    if self.api.timeout_secs == 0 {
      return Err(eyre!("api.timeout_secs must be greater than zero"));
    }
    let multiplier = self.cache.retry.multiplier;
    if !multiplier.is_finite() || multiplier < 1.0 {
      return Err(eyre!(
        "cache.retry.multiplier must be at least 1.0, got {}",
        multiplier
      ));
    }
    Ok(())
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs)
  }

  /// Header title: the configured one, or the API host.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.api.url)
      .ok()
      .and_then(|url| url.host_str().map(str::to_string))
      .unwrap_or_else(|| self.api.url.clone())
  }

  /// Get the API token from the environment.
  ///
  /// Checks TERNAK_API_TOKEN. Without it requests carry no auth header.
  pub fn get_api_token() -> Option<String> {
    std::env::var("TERNAK_API_TOKEN")
      .ok()
      .filter(|token| !token.trim().is_empty())
  }
}
