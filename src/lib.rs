//! # roster
//!
//! Offline-capable client core for a user administration API.
//!
//! - [`store`]: durable JSON key-value storage (SQLite or in-memory)
//! - [`network`]: last-known connectivity and change notifications
//! - [`queue`]: FIFO of mutations made while offline, replayed on reconnect
//! - [`cache`]: snapshot of the last known user list, patched optimistically
//! - [`sync`]: single-flight replay driven by reconnects, timers and resumes
//! - [`admin`]: the API client, session handling and the [`UserService`] facade
//!
//! The composition root owns one instance of each component and hands
//! clones to the others; clones share state.

pub mod admin;
pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod network;
pub mod queue;
pub mod store;
pub mod sync;
pub mod transport;

#[cfg(test)]
mod testing;

pub use admin::{Session, User, UserService};
pub use app::App;
pub use error::{Result, SyncError};
pub use network::NetworkMonitor;
pub use queue::{DrainReport, OfflineQueue, QueuedRequest};
pub use sync::{SyncEngine, SyncHandle};
