use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::Transport;
use crate::config::Config;

/// Backend API client
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    Self::with_token(config, Config::get_api_token())
  }

  pub fn with_token(config: &Config, token: Option<String>) -> Result<Self> {
    let base = base_url(&config.api.url)?;

    let http = reqwest::Client::builder()
      .timeout(config.timeout())
      .user_agent(concat!("ternak/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base, token })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  fn request(
    &self,
    method: Method,
    path: &str,
    query: &[(&str, String)],
    body: Option<Value>,
  ) -> BoxFuture<'static, Result<Value>> {
    let label = format!("{} {}", method, path);
    let url = match join_url(&self.base, path) {
      Ok(url) => url,
      Err(e) => return async move { Err(e) }.boxed(),
    };

    let mut request = self.http.request(method, url).query(query);
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }
    if let Some(body) = body {
      request = request.json(&body);
    }

    async move { send(request, &label).await }.boxed()
  }
}

impl Transport for ApiClient {
  fn get(&self, path: &str, query: &[(&str, String)]) -> BoxFuture<'static, Result<Value>> {
    self.request(Method::GET, path, query, None)
  }

  fn post(&self, path: &str, body: Value) -> BoxFuture<'static, Result<Value>> {
    self.request(Method::POST, path, &[], Some(body))
  }

  fn put(&self, path: &str, body: Value) -> BoxFuture<'static, Result<Value>> {
    self.request(Method::PUT, path, &[], Some(body))
  }

  fn delete(&self, path: &str) -> BoxFuture<'static, Result<Value>> {
    self.request(Method::DELETE, path, &[], None)
  }
}

async fn send(request: RequestBuilder, label: &str) -> Result<Value> {
  debug!(request = label, "sending request");
  let response = request
    .send()
    .await
    .map_err(|e| eyre!("{} failed: {}", label, e))?;

  let status = response.status();
  let body = response
    .bytes()
    .await
    .map_err(|e| eyre!("Failed to read response of {}: {}", label, e))?;

  if !status.is_success() {
    return Err(eyre!("{} returned {}: {}", label, status, error_message(&body)));
  }

  // 204 and friends
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(Value::Null);
  }

  serde_json::from_slice(&body).map_err(|e| eyre!("Invalid JSON from {}: {}", label, e))
}

/// Base URL with a trailing slash so relative paths join under it.
fn base_url(raw: &str) -> Result<Url> {
  let mut url = Url::parse(raw).map_err(|e| eyre!("Invalid API URL '{}': {}", raw, e))?;
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  Ok(url)
}

fn join_url(base: &Url, path: &str) -> Result<Url> {
  base
    .join(path.trim_start_matches('/'))
    .map_err(|e| eyre!("Invalid request path '{}': {}", path, e))
}

/// Best human-readable message from an error body.
fn error_message(body: &[u8]) -> String {
  if let Ok(value) = serde_json::from_slice::<Value>(body) {
    for field in ["message", "error", "detail"] {
      if let Some(message) = value.get(field).and_then(Value::as_str) {
        return message.to_string();
      }
    }
  }

  let text = String::from_utf8_lossy(body);
  let text = text.trim();
  if text.is_empty() {
    return "empty response".to_string();
  }
  text.chars().take(200).collect()
}
