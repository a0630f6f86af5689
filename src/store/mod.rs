//! Durable key-value storage backing the offline queue, the local cache and
//! the session token.
//!
//! Every value is JSON. Readers treat an absent key as empty; nothing here
//! coordinates concurrent writers to the same key, so callers that do
//! read-modify-write cycles must serialize them.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::KvStore;

/// Key holding the ordered list of queued requests.
pub const OFFLINE_QUEUE_KEY: &str = "offline_queue";

/// Key holding the cached user collection.
pub const USERS_CACHE_KEY: &str = "users_cache";

/// Key holding the bearer token of the current session.
pub const AUTH_TOKEN_KEY: &str = "auth_token";
