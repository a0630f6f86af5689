//! Durable FIFO of mutations made while offline.
//!
//! The queue is stored as one JSON array under [`OFFLINE_QUEUE_KEY`]. Replay is
//! fire-and-forget: a request leaves the queue once the transport delivered
//! it, whatever status the server answered with. Server-side rejections during
//! replay are therefore dropped silently.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::network::NetworkMonitor;
use crate::store::{KvStore, OFFLINE_QUEUE_KEY};
use crate::transport::{ApiRequest, Transport};

/// A request waiting to be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
  pub id: String,
  #[serde(flatten)]
  pub request: ApiRequest,
  /// Unix milliseconds at enqueue time.
  pub timestamp: i64,
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
  pub attempted: usize,
  pub delivered: usize,
  pub remaining: usize,
}

/// Offline request queue over a [`KvStore`].
///
/// Every read-modify-write of the queue key runs under one async lock, so
/// concurrent enqueues and drains never lose each other's changes.
#[derive(Clone)]
pub struct OfflineQueue {
  store: Arc<dyn KvStore>,
  lock: Arc<Mutex<()>>,
}

impl OfflineQueue {
  pub fn new(store: Arc<dyn KvStore>) -> Self {
    Self {
      store,
      lock: Arc::new(Mutex::new(())),
    }
  }

  async fn load(&self) -> Result<Vec<QueuedRequest>> {
    match self.store.get(OFFLINE_QUEUE_KEY).await? {
      Some(value @ Value::Array(_)) => Ok(serde_json::from_value(value)?),
      Some(other) => {
        warn!(kind = ?other, "offline queue is not a list, treating as empty");
        Ok(Vec::new())
      }
      None => Ok(Vec::new()),
    }
  }

  async fn save(&self, list: &[QueuedRequest]) -> Result<()> {
    self
      .store
      .set(OFFLINE_QUEUE_KEY, serde_json::to_value(list)?)
      .await
  }

  /// Append `request` and persist the whole list.
  pub async fn enqueue(&self, request: ApiRequest) -> Result<QueuedRequest> {
    let _guard = self.lock.lock().await;

    let mut queue = self.load().await?;
    let item = QueuedRequest {
      id: Uuid::new_v4().to_string(),
      request,
      timestamp: Utc::now().timestamp_millis(),
    };
    queue.push(item.clone());
    self.save(&queue).await?;

    info!(
      id = %item.id,
      method = %item.request.method,
      url = %item.request.url,
      pending = queue.len(),
      "queued request for later delivery"
    );
    Ok(item)
  }

  /// Snapshot of the pending requests in replay order.
  pub async fn pending(&self) -> Result<Vec<QueuedRequest>> {
    let _guard = self.lock.lock().await;
    self.load().await
  }

  pub async fn len(&self) -> Result<usize> {
    Ok(self.pending().await?.len())
  }

  pub async fn is_empty(&self) -> Result<bool> {
    Ok(self.len().await? == 0)
  }

  /// Replay pending requests in FIFO order when online.
  ///
  /// Requests whose transport call fails stay queued in their original
  /// order. The list is rewritten only if at least one request was
  /// delivered. Requests enqueued while the replay was in flight are kept.
  pub async fn drain_if_online(
    &self,
    network: &NetworkMonitor,
    transport: &dyn Transport,
  ) -> Result<DrainReport> {
    if !network.is_online() {
      debug!("offline, skipping queue drain");
      return Ok(DrainReport::default());
    }

    let snapshot = self.pending().await?;
    if snapshot.is_empty() {
      return Ok(DrainReport::default());
    }

    let mut delivered: HashSet<String> = HashSet::new();
    for item in &snapshot {
      match transport.send(&item.request).await {
        Ok(response) => {
          debug!(id = %item.id, status = response.status, "replayed queued request");
          delivered.insert(item.id.clone());
        }
        Err(e) => {
          warn!(id = %item.id, error = %e, "replay failed, keeping request queued");
        }
      }
    }

    if delivered.is_empty() {
      return Ok(DrainReport {
        attempted: snapshot.len(),
        delivered: 0,
        remaining: snapshot.len(),
      });
    }

    let _guard = self.lock.lock().await;
    let mut current = self.load().await?;
    current.retain(|item| !delivered.contains(&item.id));
    self.save(&current).await?;

    let report = DrainReport {
      attempted: snapshot.len(),
      delivered: delivered.len(),
      remaining: current.len(),
    };
    info!(
      delivered = report.delivered,
      remaining = report.remaining,
      "offline queue drained"
    );
    Ok(report)
  }
}
