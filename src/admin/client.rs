//! Admin API client.
//!
//! Builds the requests for the REST contract and interprets the responses.
//! Request builders are public so that offline edits can queue exactly the
//! request the online path would have sent.

use std::sync::Arc;

use super::types::{
  LoginRequest, LoginResponse, MeResponse, User, UserCreateRequest, UserUpdateRequest,
  UsersListResponse,
};
use crate::error::{Result, SyncError};
use crate::transport::{ApiRequest, HttpMethod, Transport};

const USERS_PATH: &str = "/api/admin/users";
const LOGIN_PATH: &str = "/api/auth/login";
const ME_PATH: &str = "/api/auth/me";
const LOGOUT_PATH: &str = "/api/auth/logout";

/// `/api/admin/users/<id>` with the id percent-encoded as one path segment.
fn user_path(id: &str) -> Result<String> {
  let mut url = url::Url::parse("http://localhost")
    .and_then(|base| base.join(USERS_PATH))
    .map_err(|e| SyncError::Config(format!("Invalid users path: {}", e)))?;
  url
    .path_segments_mut()
    .map_err(|_| SyncError::Config("Users path cannot take segments".to_string()))?
    .push(id);
  Ok(url.path().to_string())
}

pub fn list_users_request(token: Option<&str>) -> ApiRequest {
  ApiRequest::new(HttpMethod::Get, USERS_PATH).bearer(token)
}

pub fn create_user_request(token: Option<&str>, input: &UserCreateRequest) -> Result<ApiRequest> {
  Ok(ApiRequest::new(HttpMethod::Post, USERS_PATH).json(input)?.bearer(token))
}

pub fn update_user_request(
  token: Option<&str>,
  id: &str,
  patch: &UserUpdateRequest,
) -> Result<ApiRequest> {
  Ok(
    ApiRequest::new(HttpMethod::Put, user_path(id)?)
      .json(patch)?
      .bearer(token),
  )
}

pub fn delete_user_request(token: Option<&str>, id: &str) -> Result<ApiRequest> {
  Ok(ApiRequest::new(HttpMethod::Delete, user_path(id)?).bearer(token))
}

/// Admin API client wrapper
#[derive(Clone)]
pub struct AdminClient {
  transport: Arc<dyn Transport>,
}

impl AdminClient {
  pub fn new(transport: Arc<dyn Transport>) -> Self {
    Self { transport }
  }

  pub async fn list_users(&self, token: Option<&str>) -> Result<Vec<User>> {
    let response = self.transport.send(&list_users_request(token)).await?;
    if !response.is_success() {
      return Err(response.rejection("Failed to list users"));
    }
    Ok(response.json::<UsersListResponse>()?.users)
  }

  pub async fn create_user(&self, token: Option<&str>, input: &UserCreateRequest) -> Result<User> {
    let response = self
      .transport
      .send(&create_user_request(token, input)?)
      .await?;
    if !response.is_success() {
      return Err(response.rejection("Failed to create user"));
    }
    response.json()
  }

  pub async fn update_user(
    &self,
    token: Option<&str>,
    id: &str,
    patch: &UserUpdateRequest,
  ) -> Result<User> {
    let response = self
      .transport
      .send(&update_user_request(token, id, patch)?)
      .await?;
    if !response.is_success() {
      return Err(response.rejection("Failed to update user"));
    }
    response.json()
  }

  pub async fn delete_user(&self, token: Option<&str>, id: &str) -> Result<()> {
    let response = self.transport.send(&delete_user_request(token, id)?).await?;
    if !response.is_success() {
      return Err(response.rejection("Failed to delete user"));
    }
    Ok(())
  }

  pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
    let request =
      ApiRequest::new(HttpMethod::Post, LOGIN_PATH).json(&LoginRequest { username, password })?;
    let response = self.transport.send(&request).await?;
    if !response.is_success() {
      return Err(response.rejection("Login failed"));
    }
    response.json()
  }

  /// The user the token belongs to, `None` for unknown or missing tokens.
  pub async fn me(&self, token: Option<&str>) -> Result<Option<User>> {
    let request = ApiRequest::new(HttpMethod::Get, ME_PATH).bearer(token);
    let response = self.transport.send(&request).await?;
    if !response.is_success() {
      return Err(response.rejection("Failed to load current user"));
    }
    Ok(response.json::<MeResponse>()?.user)
  }

  pub async fn logout(&self, token: Option<&str>) -> Result<()> {
    let request = ApiRequest::new(HttpMethod::Post, LOGOUT_PATH).bearer(token);
    let response = self.transport.send(&request).await?;
    if !response.is_success() {
      return Err(response.rejection("Logout failed"));
    }
    Ok(())
  }
}
