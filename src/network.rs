//! Connectivity tracking.
//!
//! The host reports raw connectivity signals through [`NetworkMonitor::set_online`];
//! components read the last known state or subscribe to every reported signal.
//! There is no polling and no debouncing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

type Listener = Arc<dyn Fn(bool) + Send + Sync>;

struct Inner {
  online: AtomicBool,
  next_id: AtomicU64,
  listeners: Mutex<Vec<(u64, Listener)>>,
}

/// Last-known connectivity plus change notifications.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct NetworkMonitor {
  inner: Arc<Inner>,
}

impl NetworkMonitor {
  /// Create a monitor that starts out online.
  ///
  /// Hosts without a connectivity signal never call `set_online`, so they
  /// are treated as always online.
  pub fn new() -> Self {
    Self::with_state(true)
  }

  pub fn with_state(online: bool) -> Self {
    Self {
      inner: Arc::new(Inner {
        online: AtomicBool::new(online),
        next_id: AtomicU64::new(0),
        listeners: Mutex::new(Vec::new()),
      }),
    }
  }

  /// Last reported connectivity.
  pub fn is_online(&self) -> bool {
    self.inner.online.load(Ordering::SeqCst)
  }

  /// Report a connectivity signal from the platform.
  ///
  /// Every call is forwarded to subscribers, including repeats of the
  /// current state.
  pub fn set_online(&self, online: bool) {
    self.inner.online.store(online, Ordering::SeqCst);
    debug!(online, "connectivity signal");

    // Listeners run outside the lock so they may subscribe or unsubscribe.
    let listeners: Vec<Listener> = match self.inner.listeners.lock() {
      Ok(list) => list.iter().map(|(_, l)| Arc::clone(l)).collect(),
      Err(poisoned) => poisoned
        .into_inner()
        .iter()
        .map(|(_, l)| Arc::clone(l))
        .collect(),
    };
    for listener in listeners {
      listener(online);
    }
  }

  /// Register `callback` for every connectivity signal.
  ///
  /// The callback stays registered until the returned [`Subscription`] is
  /// unsubscribed or dropped.
  pub fn on_network_change<F>(&self, callback: F) -> Subscription
  where
    F: Fn(bool) + Send + Sync + 'static,
  {
    let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
    let mut listeners = match self.inner.listeners.lock() {
      Ok(list) => list,
      Err(poisoned) => poisoned.into_inner(),
    };
    listeners.push((id, Arc::new(callback)));

    Subscription {
      id,
      inner: Arc::downgrade(&self.inner),
    }
  }

  #[cfg(test)]
  fn listener_count(&self) -> usize {
    self.inner.listeners.lock().map(|l| l.len()).unwrap_or(0)
  }
}

impl Default for NetworkMonitor {
  fn default() -> Self {
    Self::new()
  }
}

/// Handle returned by [`NetworkMonitor::on_network_change`].
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
  id: u64,
  inner: Weak<Inner>,
}

impl Subscription {
  /// Stop receiving connectivity signals.
  pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(inner) = self.inner.upgrade() {
      if let Ok(mut listeners) = inner.listeners.lock() {
        listeners.retain(|(id, _)| *id != self.id);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_to_online() {
    assert!(NetworkMonitor::new().is_online());
    assert!(!NetworkMonitor::with_state(false).is_online());
  }

  #[test]
  fn test_every_signal_is_forwarded() {
    let monitor = NetworkMonitor::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let _sub = monitor.on_network_change(move |online| sink.lock().unwrap().push(online));

    monitor.set_online(false);
    monitor.set_online(false);
    monitor.set_online(true);

    assert_eq!(*seen.lock().unwrap(), vec![false, false, true]);
    assert!(monitor.is_online());
  }

  #[test]
  fn test_unsubscribe_stops_callbacks() {
    let monitor = NetworkMonitor::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let sub = monitor.on_network_change(move |online| sink.lock().unwrap().push(online));
    assert_eq!(monitor.listener_count(), 1);

    monitor.set_online(false);
    sub.unsubscribe();
    monitor.set_online(true);

    assert_eq!(monitor.listener_count(), 0);
    assert_eq!(*seen.lock().unwrap(), vec![false]);
  }

  #[test]
  fn test_clones_share_state() {
    let monitor = NetworkMonitor::new();
    let clone = monitor.clone();
    clone.set_online(false);
    assert!(!monitor.is_online());
  }
}
