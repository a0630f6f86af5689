//! The seam every remote call passes through.
//!
//! Requests are plain data (method, path, headers, JSON body) so they can be
//! persisted in the offline queue and replayed later unchanged.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
  Get,
  Post,
  Put,
  Delete,
  Patch,
}

impl HttpMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      HttpMethod::Get => "GET",
      HttpMethod::Post => "POST",
      HttpMethod::Put => "PUT",
      HttpMethod::Delete => "DELETE",
      HttpMethod::Patch => "PATCH",
    }
  }
}

impl fmt::Display for HttpMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<HttpMethod> for reqwest::Method {
  fn from(method: HttpMethod) -> Self {
    match method {
      HttpMethod::Get => reqwest::Method::GET,
      HttpMethod::Post => reqwest::Method::POST,
      HttpMethod::Put => reqwest::Method::PUT,
      HttpMethod::Delete => reqwest::Method::DELETE,
      HttpMethod::Patch => reqwest::Method::PATCH,
    }
  }
}

/// A request to the remote service.
///
/// `url` is a path relative to the configured API base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
  pub url: String,
  pub method: HttpMethod,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub headers: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<Value>,
}

impl ApiRequest {
  pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      method,
      headers: BTreeMap::new(),
      body: None,
    }
  }

  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.insert(name.into(), value.into());
    self
  }

  /// Attach a JSON body and the matching content type.
  pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
    self.body = Some(serde_json::to_value(body)?);
    self
      .headers
      .insert("Content-Type".to_string(), "application/json".to_string());
    Ok(self)
  }

  /// Attach `Authorization: Bearer <token>` when a token is present.
  pub fn bearer(self, token: Option<&str>) -> Self {
    match token {
      Some(token) => self.header("Authorization", format!("Bearer {}", token)),
      None => self,
    }
  }
}

/// A response from the remote service, any status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  error: Option<String>,
}

impl ApiResponse {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      body: body.into(),
    }
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Decode the body of a success response.
  pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
    serde_json::from_slice(&self.body).map_err(|e| SyncError::Decode(e.to_string()))
  }

  /// Turn a non-success response into a [`SyncError::Rejected`].
  ///
  /// Uses the server's `{ "error": ... }` message when the body carries one,
  /// `fallback` otherwise.
  pub fn rejection(&self, fallback: &str) -> SyncError {
    let message = serde_json::from_slice::<ErrorBody>(&self.body)
      .ok()
      .and_then(|b| b.error)
      .filter(|m| !m.is_empty())
      .unwrap_or_else(|| fallback.to_string());

    SyncError::Rejected {
      status: self.status,
      message,
    }
  }
}

/// Sends requests to the remote service.
///
/// Implementations return `Ok` for every response that arrived, whatever its
/// status, and `SyncError::Transport` only when no response was obtained.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Join `path` onto `base` with exactly one slash between them.
///
/// An empty base leaves the path untouched.
pub fn api_url(base: &str, path: &str) -> String {
  if base.is_empty() {
    return path.to_string();
  }
  let left = base.strip_suffix('/').unwrap_or(base);
  if path.starts_with('/') {
    format!("{}{}", left, path)
  } else {
    format!("{}/{}", left, path)
  }
}

/// [`Transport`] over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: String,
}

impl HttpTransport {
  pub fn new(base_url: &str) -> Result<Self> {
    url::Url::parse(base_url)
      .map_err(|e| SyncError::Config(format!("Invalid API base URL {}: {}", base_url, e)))?;

    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self {
      client,
      base_url: base_url.to_string(),
    })
  }
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
  let mut map = HeaderMap::new();
  for (name, value) in headers {
    let name = HeaderName::from_bytes(name.as_bytes())
      .map_err(|e| SyncError::Transport(format!("Invalid header name {}: {}", name, e)))?;
    let value = HeaderValue::from_str(value)
      .map_err(|e| SyncError::Transport(format!("Invalid header value for {}: {}", name, e)))?;
    map.insert(name, value);
  }
  Ok(map)
}

#[async_trait]
impl Transport for HttpTransport {
  async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
    let url = api_url(&self.base_url, &request.url);
    debug!(method = %request.method, %url, "sending request");

    let mut builder = self
      .client
      .request(request.method.into(), &url)
      .headers(header_map(&request.headers)?);
    if let Some(body) = &request.body {
      builder = builder.body(serde_json::to_vec(body)?);
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?;

    Ok(ApiResponse::new(status, body.to_vec()))
  }
}
