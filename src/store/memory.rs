//! In-memory storage backend.
//!
//! Nothing survives the process; used by tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use super::traits::KvStore;
use crate::error::{Result, SyncError};

/// HashMap-backed implementation of [`KvStore`].
#[derive(Default)]
pub struct MemoryStore {
  data: RwLock<HashMap<String, Value>>,
  writes: AtomicUsize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of `set` calls served so far.
  pub fn write_count(&self) -> usize {
    self.writes.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl KvStore for MemoryStore {
  async fn get(&self, key: &str) -> Result<Option<Value>> {
    let data = self
      .data
      .read()
      .map_err(|e| SyncError::Storage(format!("Lock poisoned: {}", e)))?;
    Ok(data.get(key).cloned())
  }

  async fn set(&self, key: &str, value: Value) -> Result<()> {
    let mut data = self
      .data
      .write()
      .map_err(|e| SyncError::Storage(format!("Lock poisoned: {}", e)))?;
    data.insert(key.to_string(), value);
    self.writes.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}
