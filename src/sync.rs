//! Replays the offline queue when connectivity allows.
//!
//! A drain is attempted at start, on every online signal, on each interval
//! tick and whenever the host asks for one (for example when it resumes from
//! sleep). Failed requests simply wait for the next trigger; there is no
//! backoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::network::{NetworkMonitor, Subscription};
use crate::queue::{DrainReport, OfflineQueue};
use crate::transport::Transport;

/// Why a drain was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
  Start,
  Reconnect,
  Interval,
  Resume,
}

/// Bridges the network monitor and the offline queue.
#[derive(Clone)]
pub struct SyncEngine {
  queue: OfflineQueue,
  network: NetworkMonitor,
  transport: Arc<dyn Transport>,
  interval: Option<Duration>,
  draining: Arc<AtomicBool>,
}

/// Clears the in-flight flag when a drain ends, however it ends.
struct DrainGuard(Arc<AtomicBool>);

impl Drop for DrainGuard {
  fn drop(&mut self) {
    self.0.store(false, Ordering::SeqCst);
  }
}

impl SyncEngine {
  pub fn new(queue: OfflineQueue, network: NetworkMonitor, transport: Arc<dyn Transport>) -> Self {
    Self {
      queue,
      network,
      transport,
      interval: None,
      draining: Arc::new(AtomicBool::new(false)),
    }
  }

  /// Also drain every `period`. A zero period disables the timer.
  pub fn with_interval(mut self, period: Duration) -> Self {
    self.interval = (!period.is_zero()).then_some(period);
    self
  }

  /// Run one drain unless another is already in flight.
  ///
  /// Returns `None` when skipped.
  pub async fn sync_now(&self) -> Result<Option<DrainReport>> {
    if self
      .draining
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      debug!("drain already in flight, skipping");
      return Ok(None);
    }
    let _guard = DrainGuard(Arc::clone(&self.draining));

    let report = self
      .queue
      .drain_if_online(&self.network, self.transport.as_ref())
      .await?;
    Ok(Some(report))
  }

  async fn run_trigger(&self, trigger: SyncTrigger) {
    match self.sync_now().await {
      Ok(Some(report)) if report.attempted > 0 => {
        info!(
          ?trigger,
          delivered = report.delivered,
          remaining = report.remaining,
          "sync finished"
        );
      }
      Ok(_) => debug!(?trigger, "nothing to sync"),
      Err(e) => warn!(?trigger, error = %e, "sync failed"),
    }
  }

  /// Spawn the trigger loop on the current runtime.
  pub fn start(&self) -> SyncHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let reconnect_tx = tx.clone();
    let subscription = self.network.on_network_change(move |online| {
      if online {
        let _ = reconnect_tx.send(SyncTrigger::Reconnect);
      }
    });

    let engine = self.clone();
    let task = tokio::spawn(async move {
      let mut ticker = engine.interval.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
      });

      engine.run_trigger(SyncTrigger::Start).await;
      loop {
        let trigger = tokio::select! {
          biased;
          _ = &mut shutdown_rx => break,
          trigger = rx.recv() => match trigger {
            Some(trigger) => trigger,
            None => break,
          },
          _ = next_tick(&mut ticker) => SyncTrigger::Interval,
        };
        engine.run_trigger(trigger).await;
      }
      debug!("sync loop stopped");
    });

    SyncHandle {
      tx,
      shutdown: Some(shutdown_tx),
      task,
      _subscription: subscription,
    }
  }
}

async fn next_tick(ticker: &mut Option<Interval>) {
  match ticker {
    Some(ticker) => {
      ticker.tick().await;
    }
    None => std::future::pending().await,
  }
}

/// Running sync loop started by [`SyncEngine::start`].
pub struct SyncHandle {
  tx: mpsc::UnboundedSender<SyncTrigger>,
  shutdown: Option<oneshot::Sender<()>>,
  task: JoinHandle<()>,
  _subscription: Subscription,
}

impl SyncHandle {
  /// Ask for a drain, e.g. after the host resumed.
  pub fn resume(&self) {
    let _ = self.tx.send(SyncTrigger::Resume);
  }

  /// Stop the loop after the drain in progress, if any, completes.
  pub async fn shutdown(mut self) {
    if let Some(shutdown) = self.shutdown.take() {
      let _ = shutdown.send(());
    }
    if let Err(e) = (&mut self.task).await {
      warn!(error = %e, "sync loop ended abnormally");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::SyncError;
  use crate::store::MemoryStore;
  use crate::testing::ScriptedTransport;
  use crate::transport::{ApiRequest, ApiResponse, HttpMethod};
  use async_trait::async_trait;
  use tokio::sync::Notify;

  fn request(url: &str) -> ApiRequest {
    ApiRequest::new(HttpMethod::Delete, url)
  }

  async fn wait_until_empty(queue: &OfflineQueue) -> bool {
    for _ in 0..100 {
      if queue.is_empty().await.unwrap() {
        return true;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
  }

  #[tokio::test]
  async fn test_reconnect_triggers_drain() {
    let queue = OfflineQueue::new(Arc::new(MemoryStore::new()));
    let network = NetworkMonitor::with_state(false);
    let transport = Arc::new(ScriptedTransport::new());
    queue.enqueue(request("/a")).await.unwrap();

    let handle = SyncEngine::new(queue.clone(), network.clone(), transport.clone()).start();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(queue.len().await.unwrap(), 1);
    assert!(transport.sent().is_empty());

    network.set_online(true);
    assert!(wait_until_empty(&queue).await);
    assert_eq!(transport.sent_urls(), vec!["/a"]);

    handle.shutdown().await;
  }

  #[tokio::test]
  async fn test_start_drains_when_already_online() {
    let queue = OfflineQueue::new(Arc::new(MemoryStore::new()));
    let transport = Arc::new(ScriptedTransport::new());
    queue.enqueue(request("/a")).await.unwrap();

    let handle = SyncEngine::new(queue.clone(), NetworkMonitor::new(), transport).start();
    assert!(wait_until_empty(&queue).await);
    handle.shutdown().await;
  }

  #[tokio::test]
  async fn test_interval_retries_failed_items() {
    let queue = OfflineQueue::new(Arc::new(MemoryStore::new()));
    let transport = Arc::new(ScriptedTransport::new());
    transport.fail_path("/a");
    queue.enqueue(request("/a")).await.unwrap();

    let handle = SyncEngine::new(queue.clone(), NetworkMonitor::new(), transport.clone())
      .with_interval(Duration::from_millis(20))
      .start();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(queue.len().await.unwrap(), 1);

    transport.clear_failures();
    assert!(wait_until_empty(&queue).await);
    handle.shutdown().await;
  }

  #[tokio::test]
  async fn test_resume_triggers_drain() {
    let queue = OfflineQueue::new(Arc::new(MemoryStore::new()));
    let transport = Arc::new(ScriptedTransport::new());
    let handle = SyncEngine::new(queue.clone(), NetworkMonitor::new(), transport.clone()).start();
    tokio::time::sleep(Duration::from_millis(20)).await;

    queue.enqueue(request("/late")).await.unwrap();
    handle.resume();
    assert!(wait_until_empty(&queue).await);
    handle.shutdown().await;
  }

  /// Holds every send until released.
  struct GatedTransport {
    entered: Notify,
    release: Notify,
  }

  #[async_trait]
  impl Transport for GatedTransport {
    async fn send(&self, _request: &ApiRequest) -> std::result::Result<ApiResponse, SyncError> {
      self.entered.notify_one();
      self.release.notified().await;
      Ok(ApiResponse::new(200, Vec::new()))
    }
  }

  #[tokio::test]
  async fn test_drains_are_single_flight() {
    let queue = OfflineQueue::new(Arc::new(MemoryStore::new()));
    queue.enqueue(request("/a")).await.unwrap();
    let transport = Arc::new(GatedTransport {
      entered: Notify::new(),
      release: Notify::new(),
    });
    let engine = SyncEngine::new(queue.clone(), NetworkMonitor::new(), transport.clone());

    let first = tokio::spawn({
      let engine = engine.clone();
      async move { engine.sync_now().await }
    });
    transport.entered.notified().await;

    assert_eq!(engine.sync_now().await.unwrap(), None);

    transport.release.notify_one();
    let report = first.await.unwrap().unwrap().unwrap();
    assert_eq!(report.delivered, 1);

    // The flag is cleared once the first drain is done.
    assert_eq!(
      engine.sync_now().await.unwrap(),
      Some(DrainReport::default())
    );
  }
}
