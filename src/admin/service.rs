//! User management facade.
//!
//! Every operation picks the online or offline path from the network
//! monitor. Online, the server's answer is authoritative and the cache is
//! patched to match. Offline, the cache is patched optimistically first and
//! the equivalent request is queued second.

use tracing::{debug, info};
use uuid::Uuid;

use super::client::{self, AdminClient};
use super::session::Session;
use super::types::{User, UserCreateRequest, UserUpdateRequest};
use crate::cache::LocalCache;
use crate::error::{Result, SyncError};
use crate::network::NetworkMonitor;
use crate::queue::OfflineQueue;

/// The single call surface for user operations.
#[derive(Clone)]
pub struct UserService {
  client: AdminClient,
  session: Session,
  network: NetworkMonitor,
  queue: OfflineQueue,
  cache: LocalCache<User>,
}

impl UserService {
  pub fn new(
    client: AdminClient,
    session: Session,
    network: NetworkMonitor,
    queue: OfflineQueue,
    cache: LocalCache<User>,
  ) -> Self {
    Self {
      client,
      session,
      network,
      queue,
      cache,
    }
  }

  /// All users. Offline, whatever the cache holds.
  pub async fn list_users(&self) -> Result<Vec<User>> {
    if !self.network.is_online() {
      debug!("offline, serving users from cache");
      return Ok(self.cache.get().await?.unwrap_or_default());
    }

    let token = self.session.token().await?;
    let users = self.client.list_users(token.as_deref()).await?;
    self.cache.set(&users).await?;
    Ok(users)
  }

  /// Create a user. Offline, the returned user carries a local id that the
  /// server will not reuse.
  pub async fn create_user(&self, input: &UserCreateRequest) -> Result<User> {
    let token = self.session.token().await?;

    if !self.network.is_online() {
      let user = input.to_local_user(Uuid::new_v4().to_string());
      self.cache.append(user.clone()).await?;
      self
        .queue
        .enqueue(client::create_user_request(token.as_deref(), input)?)
        .await?;
      info!(id = %user.id, username = %user.username, "created user offline");
      return Ok(user);
    }

    let user = self.client.create_user(token.as_deref(), input).await?;
    self.cache.append(user.clone()).await?;
    Ok(user)
  }

  /// Update a user. Offline, the user must be in the cache.
  pub async fn update_user(&self, id: &str, patch: &UserUpdateRequest) -> Result<User> {
    let token = self.session.token().await?;

    if !self.network.is_online() {
      let merged = self
        .cache
        .try_update(|users| {
          users.iter_mut().find(|u| u.id == id).map(|user| {
            user.merge(patch);
            user.clone()
          })
        })
        .await?
        .ok_or_else(|| SyncError::NotFound(format!("user {}", id)))?;
      self
        .queue
        .enqueue(client::update_user_request(token.as_deref(), id, patch)?)
        .await?;
      info!(id, "updated user offline");
      return Ok(merged);
    }

    let user = self.client.update_user(token.as_deref(), id, patch).await?;
    self
      .cache
      .update(|users| {
        for cached in users.iter_mut().filter(|u| u.id == id) {
          *cached = user.clone();
        }
      })
      .await?;
    Ok(user)
  }

  pub async fn delete_user(&self, id: &str) -> Result<()> {
    let token = self.session.token().await?;

    if !self.network.is_online() {
      self.cache.remove(id).await?;
      self
        .queue
        .enqueue(client::delete_user_request(token.as_deref(), id)?)
        .await?;
      info!(id, "deleted user offline");
      return Ok(());
    }

    self.client.delete_user(token.as_deref(), id).await?;
    self.cache.remove(id).await?;
    Ok(())
  }
}
