//! Storage trait shared by all backends.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Trait for key-value storage backends.
///
/// `set` must not return before the value is durable for the backend in
/// question. The last `set` to a key wins.
#[async_trait]
pub trait KvStore: Send + Sync {
  /// Read the value stored under `key`, or `None` if it was never written.
  async fn get(&self, key: &str) -> Result<Option<Value>>;

  /// Replace the value stored under `key`.
  async fn set(&self, key: &str, value: Value) -> Result<()>;
}
