//! Error types for the offline sync layer.

use thiserror::Error;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by the store, queue, cache and user service.
#[derive(Debug, Error)]
pub enum SyncError {
  /// The request never produced a response (unreachable host, DNS, reset).
  #[error("network request failed: {0}")]
  Transport(String),

  /// The server answered with a non-success status.
  ///
  /// Displays as the server-supplied message alone so callers can show it as is.
  #[error("{message}")]
  Rejected { status: u16, message: String },

  /// An offline edit referenced an entity that is not in the local cache.
  #[error("not found: {0}")]
  NotFound(String),

  #[error("storage error: {0}")]
  Storage(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// A success response whose body did not have the expected shape.
  #[error("unexpected response body: {0}")]
  Decode(String),

  #[error("invalid configuration: {0}")]
  Config(String),
}

impl SyncError {
  /// True for failures where the request may never have reached the server.
  pub fn is_transport(&self) -> bool {
    matches!(self, SyncError::Transport(_))
  }

  /// HTTP status of a rejected request.
  pub fn status(&self) -> Option<u16> {
    match self {
      SyncError::Rejected { status, .. } => Some(*status),
      _ => None,
    }
  }
}

impl From<reqwest::Error> for SyncError {
  fn from(e: reqwest::Error) -> Self {
    SyncError::Transport(e.to_string())
  }
}

impl From<rusqlite::Error> for SyncError {
  fn from(e: rusqlite::Error) -> Self {
    SyncError::Storage(e.to_string())
  }
}
