//! Types matching the admin and auth API payloads.

use serde::{Deserialize, Serialize};

use crate::cache::Entity;

fn default_active() -> bool {
  true
}

/// An account as returned by the admin API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  pub username: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub email: String,
  pub role: String,
  #[serde(default = "default_active")]
  pub active: bool,
}

impl User {
  /// Apply the fields present in `patch`.
  pub fn merge(&mut self, patch: &UserUpdateRequest) {
    if let Some(username) = &patch.username {
      self.username = username.clone();
    }
    if let Some(name) = &patch.name {
      self.name = name.clone();
    }
    if let Some(email) = &patch.email {
      self.email = email.clone();
    }
    if let Some(role) = &patch.role {
      self.role = role.clone();
    }
    if let Some(active) = patch.active {
      self.active = active;
    }
  }
}

impl Entity for User {
  fn id(&self) -> &str {
    &self.id
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCreateRequest {
  pub username: String,
  pub role: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub active: Option<bool>,
}

impl UserCreateRequest {
  /// Locally-built stand-in for the user the server will create.
  pub fn to_local_user(&self, id: String) -> User {
    User {
      id,
      username: self.username.clone(),
      name: self.name.clone().unwrap_or_default(),
      email: self.email.clone().unwrap_or_default(),
      role: self.role.clone(),
      active: self.active.unwrap_or(true),
    }
  }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdateRequest {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub username: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UsersListResponse {
  pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
  pub username: &'a str,
  pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
  pub token: String,
  pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct MeResponse {
  pub user: Option<User>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_user_defaults_missing_fields() {
    let user: User = serde_json::from_value(json!({
      "id": "u1",
      "username": "a",
      "role": "member"
    }))
    .unwrap();

    assert_eq!(user.name, "");
    assert_eq!(user.email, "");
    assert!(user.active);
  }

  #[test]
  fn test_merge_applies_only_present_fields() {
    let mut user = UserCreateRequest {
      username: "a".into(),
      role: "member".into(),
      email: Some("a@example.com".into()),
      ..Default::default()
    }
    .to_local_user("u1".into());

    user.merge(&UserUpdateRequest {
      role: Some("manager".into()),
      active: Some(false),
      password: Some("ignored".into()),
      ..Default::default()
    });

    assert_eq!(user.username, "a");
    assert_eq!(user.email, "a@example.com");
    assert_eq!(user.role, "manager");
    assert!(!user.active);
  }

  #[test]
  fn test_create_request_omits_absent_fields() {
    let req = UserCreateRequest {
      username: "a".into(),
      role: "member".into(),
      ..Default::default()
    };
    assert_eq!(
      serde_json::to_value(&req).unwrap(),
      json!({"username": "a", "role": "member"})
    );
  }
}
