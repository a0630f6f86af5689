//! Composition root.
//!
//! Owns the store, monitor, queue and cache, and wires them into the user
//! service, the session and the sync engine.

use std::sync::Arc;

use crate::admin::{AdminClient, Session, User, UserService};
use crate::cache::LocalCache;
use crate::config::Config;
use crate::error::Result;
use crate::network::NetworkMonitor;
use crate::queue::OfflineQueue;
use crate::store::{KvStore, SqliteStore, USERS_CACHE_KEY};
use crate::sync::SyncEngine;
use crate::transport::{HttpTransport, Transport};

/// Main application state
pub struct App {
  pub network: NetworkMonitor,
  pub queue: OfflineQueue,
  pub cache: LocalCache<User>,
  pub session: Session,
  pub users: UserService,
  pub sync: SyncEngine,
}

impl App {
  /// Open the configured database and connect to the configured API.
  pub fn new(config: &Config) -> Result<Self> {
    let store = match &config.storage.path {
      Some(path) => SqliteStore::open_at(path)?,
      None => SqliteStore::open()?,
    };
    let transport = HttpTransport::new(&config.api.base_url)?;

    Ok(Self::from_parts(
      Arc::new(store),
      Arc::new(transport),
      NetworkMonitor::with_state(!config.offline),
      config,
    ))
  }

  pub fn from_parts(
    store: Arc<dyn KvStore>,
    transport: Arc<dyn Transport>,
    network: NetworkMonitor,
    config: &Config,
  ) -> Self {
    let client = AdminClient::new(Arc::clone(&transport));
    let session = Session::new(client.clone(), Arc::clone(&store));
    let queue = OfflineQueue::new(Arc::clone(&store));
    let cache = LocalCache::new(store, USERS_CACHE_KEY);

    let users = UserService::new(
      client,
      session.clone(),
      network.clone(),
      queue.clone(),
      cache.clone(),
    );
    let sync = SyncEngine::new(queue.clone(), network.clone(), transport)
      .with_interval(config.sync.interval());

    Self {
      network,
      queue,
      cache,
      session,
      users,
      sync,
    }
  }
}
