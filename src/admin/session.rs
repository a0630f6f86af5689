//! Login state.
//!
//! The bearer token is persisted under [`AUTH_TOKEN_KEY`] so that requests
//! queued in later runs still carry it.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::client::AdminClient;
use super::types::User;
use crate::error::Result;
use crate::store::{KvStore, AUTH_TOKEN_KEY};

#[derive(Clone)]
pub struct Session {
  client: AdminClient,
  store: Arc<dyn KvStore>,
}

impl Session {
  pub fn new(client: AdminClient, store: Arc<dyn KvStore>) -> Self {
    Self { client, store }
  }

  /// Stored bearer token, if logged in.
  pub async fn token(&self) -> Result<Option<String>> {
    match self.store.get(AUTH_TOKEN_KEY).await? {
      Some(Value::String(token)) if !token.is_empty() => Ok(Some(token)),
      _ => Ok(None),
    }
  }

  pub async fn login(&self, username: &str, password: &str) -> Result<User> {
    let response = self.client.login(username, password).await?;
    self
      .store
      .set(AUTH_TOKEN_KEY, Value::String(response.token))
      .await?;
    info!(username, "logged in");
    Ok(response.user)
  }

  /// End the session. The stored token is cleared even if the server call fails.
  pub async fn logout(&self) -> Result<()> {
    let token = self.token().await?;
    if let Err(e) = self.client.logout(token.as_deref()).await {
      warn!(error = %e, "logout request failed, clearing local session anyway");
    }
    self.store.set(AUTH_TOKEN_KEY, Value::Null).await
  }

  pub async fn current_user(&self) -> Result<Option<User>> {
    let token = self.token().await?;
    if token.is_none() {
      return Ok(None);
    }
    self.client.me(token.as_deref()).await
  }
}
