//! Durable snapshot of the last known entity collection.
//!
//! The snapshot is replaced wholesale after every successful remote list and
//! patched in place by local edits. There is no expiry: cached data is good
//! enough to render until authoritative data replaces it.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::store::KvStore;

/// Trait for entities that can live in a [`LocalCache`].
///
/// Two entities are the same cache entry when their ids are equal.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned {
  fn id(&self) -> &str;
}

/// Ordered entity collection stored under one fixed key.
pub struct LocalCache<T> {
  store: Arc<dyn KvStore>,
  key: &'static str,
  lock: Arc<Mutex<()>>,
  _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> LocalCache<T> {
  pub fn new(store: Arc<dyn KvStore>, key: &'static str) -> Self {
    Self {
      store,
      key,
      lock: Arc::new(Mutex::new(())),
      _entity: PhantomData,
    }
  }

  async fn load(&self) -> Result<Option<Vec<T>>> {
    match self.store.get(self.key).await? {
      Some(Value::Null) | None => Ok(None),
      Some(value @ Value::Array(_)) => Ok(Some(serde_json::from_value(value)?)),
      Some(_) => {
        warn!(key = self.key, "cached value is not a list, ignoring it");
        Ok(None)
      }
    }
  }

  async fn save(&self, entities: &[T]) -> Result<()> {
    self.store.set(self.key, serde_json::to_value(entities)?).await
  }

  /// Cached collection, or `None` if nothing was ever cached.
  pub async fn get(&self) -> Result<Option<Vec<T>>> {
    let _guard = self.lock.lock().await;
    self.load().await
  }

  /// Replace the cached collection.
  pub async fn set(&self, entities: &[T]) -> Result<()> {
    let _guard = self.lock.lock().await;
    self.save(entities).await
  }

  /// Read-modify-write the collection under the cache lock.
  ///
  /// An absent collection is presented as empty. The result is always
  /// written back.
  pub async fn update<R, F>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut Vec<T>) -> R,
  {
    let _guard = self.lock.lock().await;
    let mut entities = self.load().await?.unwrap_or_default();
    let result = f(&mut entities);
    self.save(&entities).await?;
    Ok(result)
  }

  /// Like [`update`](Self::update), but writes back only when `f` returns
  /// `Some`. On `None` the stored value is left exactly as it was.
  pub async fn try_update<R, F>(&self, f: F) -> Result<Option<R>>
  where
    F: FnOnce(&mut Vec<T>) -> Option<R>,
  {
    let _guard = self.lock.lock().await;
    let mut entities = self.load().await?.unwrap_or_default();
    let result = f(&mut entities);
    if result.is_some() {
      self.save(&entities).await?;
    }
    Ok(result)
  }

  /// Append `entity` to the end of the collection.
  pub async fn append(&self, entity: T) -> Result<()> {
    self.update(|list| list.push(entity)).await
  }

  /// Replace the entry with the same id. Returns false if there was none.
  pub async fn replace(&self, entity: T) -> Result<bool> {
    self
      .update(|list| match list.iter_mut().find(|e| e.id() == entity.id()) {
        Some(slot) => {
          *slot = entity;
          true
        }
        None => false,
      })
      .await
  }

  /// Remove every entry with `id`. Returns the number removed.
  pub async fn remove(&self, id: &str) -> Result<usize> {
    self
      .update(|list| {
        let before = list.len();
        list.retain(|e| e.id() != id);
        before - list.len()
      })
      .await
  }
}

impl<T> Clone for LocalCache<T> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      key: self.key,
      lock: Arc::clone(&self.lock),
      _entity: PhantomData,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;
  use serde::Deserialize;
  use serde_json::json;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Item {
    id: String,
    label: String,
  }

  impl Entity for Item {
    fn id(&self) -> &str {
      &self.id
    }
  }

  fn item(id: &str, label: &str) -> Item {
    Item {
      id: id.to_string(),
      label: label.to_string(),
    }
  }

  fn cache() -> LocalCache<Item> {
    LocalCache::new(Arc::new(MemoryStore::new()), "items_cache")
  }

  #[tokio::test]
  async fn test_round_trip() {
    let cache = cache();
    assert_eq!(cache.get().await.unwrap(), None);

    let items = vec![item("1", "one"), item("2", "two")];
    cache.set(&items).await.unwrap();
    assert_eq!(cache.get().await.unwrap(), Some(items));
  }

  #[tokio::test]
  async fn test_patch_operations() {
    let cache = cache();
    cache.append(item("1", "one")).await.unwrap();
    cache.append(item("2", "two")).await.unwrap();

    assert!(cache.replace(item("2", "deux")).await.unwrap());
    assert!(!cache.replace(item("3", "trois")).await.unwrap());
    assert_eq!(cache.remove("1").await.unwrap(), 1);
    assert_eq!(cache.remove("1").await.unwrap(), 0);

    assert_eq!(cache.get().await.unwrap(), Some(vec![item("2", "deux")]));
  }

  #[tokio::test]
  async fn test_try_update_writes_only_on_some() {
    let store = Arc::new(MemoryStore::new());
    let cache: LocalCache<Item> = LocalCache::new(store.clone(), "items_cache");

    let missing = cache
      .try_update(|list| list.iter_mut().find(|i| i.id == "1").map(|_| ()))
      .await
      .unwrap();
    assert_eq!(missing, None);
    assert_eq!(store.write_count(), 0);
    assert!(store.get("items_cache").await.unwrap().is_none());

    cache.set(&[item("1", "one")]).await.unwrap();
    let renamed = cache
      .try_update(|list| {
        list.iter_mut().find(|i| i.id == "1").map(|i| {
          i.label = "uno".to_string();
          i.clone()
        })
      })
      .await
      .unwrap();
    assert_eq!(renamed, Some(item("1", "uno")));
    assert_eq!(store.write_count(), 2);
    assert_eq!(cache.get().await.unwrap(), Some(vec![item("1", "uno")]));
  }

  #[tokio::test]
  async fn test_concurrent_appends_are_not_lost() {
    let cache = cache();
    let mut tasks = Vec::new();
    for n in 0..20 {
      let cache = cache.clone();
      tasks.push(tokio::spawn(async move {
        cache.append(item(&n.to_string(), "x")).await.unwrap();
      }));
    }
    for task in tasks {
      task.await.unwrap();
    }

    assert_eq!(cache.get().await.unwrap().unwrap().len(), 20);
  }

  #[tokio::test]
  async fn test_non_list_value_is_ignored() {
    let store = Arc::new(MemoryStore::new());
    store.set("items_cache", json!("garbage")).await.unwrap();
    let cache: LocalCache<Item> = LocalCache::new(store, "items_cache");

    assert_eq!(cache.get().await.unwrap(), None);
  }
}
