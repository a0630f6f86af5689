//! SQLite storage backend.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::KvStore;
use crate::error::{Result, SyncError};

/// Schema for the key-value table.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// SQLite-based implementation of [`KvStore`].
///
/// Values are stored as JSON text, one row per key.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open or create the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| SyncError::Storage(format!("Failed to create data directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      SyncError::Storage(format!(
        "Failed to open database at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::from_connection(conn)
  }

  /// Open a private in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| SyncError::Storage("Could not determine data directory".to_string()))?;

    Ok(data_dir.join("roster").join("roster.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| SyncError::Storage(format!("Failed to run migrations: {}", e)))?;
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| SyncError::Storage(format!("Lock poisoned: {}", e)))
  }
}

#[async_trait]
impl KvStore for SqliteStore {
  async fn get(&self, key: &str) -> Result<Option<Value>> {
    let conn = self.lock()?;

    let raw: Option<String> = conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| SyncError::Storage(format!("Failed to read {}: {}", key, e)))?;

    match raw {
      Some(text) => {
        let value = serde_json::from_str(&text)
          .map_err(|e| SyncError::Storage(format!("Corrupt value under {}: {}", key, e)))?;
        Ok(Some(value))
      }
      None => Ok(None),
    }
  }

  async fn set(&self, key: &str, value: Value) -> Result<()> {
    let text = serde_json::to_string(&value)?;
    let conn = self.lock()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, text],
      )
      .map_err(|e| SyncError::Storage(format!("Failed to write {}: {}", key, e)))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn test_set_then_get() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.get("users_cache").await.unwrap().is_none());

    store
      .set("users_cache", json!([{"id": "u1", "username": "a"}]))
      .await
      .unwrap();
    let value = store.get("users_cache").await.unwrap().unwrap();
    assert_eq!(value, json!([{"id": "u1", "username": "a"}]));
  }

  #[tokio::test]
  async fn test_values_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("roster.db");

    {
      let store = SqliteStore::open_at(&path).unwrap();
      store.set("offline_queue", json!([1, 2, 3])).await.unwrap();
      store.set("offline_queue", json!([3])).await.unwrap();
    }

    let reopened = SqliteStore::open_at(&path).unwrap();
    assert_eq!(
      reopened.get("offline_queue").await.unwrap(),
      Some(json!([3]))
    );
  }

  #[tokio::test]
  async fn test_non_json_value_is_storage_error() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
      .lock()
      .unwrap()
      .execute(
        "INSERT INTO kv_store (key, value) VALUES (?, ?)",
        params!["users_cache", "{not json"],
      )
      .unwrap();

    let err = store.get("users_cache").await.unwrap_err();
    assert!(matches!(err, SyncError::Storage(_)));
    assert!(err.to_string().contains("users_cache"));
  }

  #[tokio::test]
  async fn test_keys_are_independent() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set("a", json!("token")).await.unwrap();
    store.set("b", json!(null)).await.unwrap();

    assert_eq!(store.get("a").await.unwrap(), Some(json!("token")));
    assert_eq!(store.get("b").await.unwrap(), Some(json!(null)));
  }
}
