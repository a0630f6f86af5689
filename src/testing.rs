//! In-process fakes shared by unit tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{Result, SyncError};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Transport that records every request and answers from a script.
///
/// Unscripted paths answer `200 {}`. Paths marked with `fail_path` fail at
/// the transport level.
#[derive(Default)]
pub struct ScriptedTransport {
  sent: Mutex<Vec<ApiRequest>>,
  failing: Mutex<HashSet<String>>,
  responses: Mutex<HashMap<String, (u16, Value)>>,
}

impl ScriptedTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_path(&self, path: &str) {
    self.failing.lock().unwrap().insert(path.to_string());
  }

  pub fn clear_failures(&self) {
    self.failing.lock().unwrap().clear();
  }

  pub fn respond(&self, path: &str, status: u16, body: Value) {
    self
      .responses
      .lock()
      .unwrap()
      .insert(path.to_string(), (status, body));
  }

  pub fn sent(&self) -> Vec<ApiRequest> {
    self.sent.lock().unwrap().clone()
  }

  pub fn sent_urls(&self) -> Vec<String> {
    self.sent().into_iter().map(|r| r.url).collect()
  }
}

#[async_trait]
impl Transport for ScriptedTransport {
  async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
    self.sent.lock().unwrap().push(request.clone());

    if self.failing.lock().unwrap().contains(&request.url) {
      return Err(SyncError::Transport(format!(
        "connection refused: {}",
        request.url
      )));
    }

    let (status, body) = self
      .responses
      .lock()
      .unwrap()
      .get(&request.url)
      .cloned()
      .unwrap_or((200, json!({})));
    let bytes = if body.is_null() {
      Vec::new()
    } else {
      serde_json::to_vec(&body)?
    };
    Ok(ApiResponse::new(status, bytes))
  }
}
