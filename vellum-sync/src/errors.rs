//! Error types for the sync engine
//!
//! The taxonomy matters for control flow: configuration errors block a pass
//! before it starts, auth errors are surfaced without automatic retry,
//! network errors are retryable, and per-file transfer failures are isolated
//! from the rest of the batch.

use thiserror::Error;
use vellum_index::IndexError;
use vellum_transport::TransportError;
use vellum_vfs::VfsError;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Missing endpoint or credentials. Blocks sync start; never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid or expired credential. Requires reconfiguration.
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// A sync pass is already running; single-flight enforcement.
    #[error("a sync pass is already in progress")]
    AlreadySyncing,

    #[error("sync is paused")]
    Paused,

    #[error("transfer failed for {path}: {reason}")]
    Transfer { path: String, reason: String },

    #[error("conflict not found: {0}")]
    ConflictNotFound(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("VFS error: {0}")]
    Vfs(#[from] VfsError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<TransportError> for SyncError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Auth(msg) => SyncError::Auth(msg),
            TransportError::Network(msg) => SyncError::Network(msg),
            TransportError::InvalidUrl(url) => {
                SyncError::Configuration(format!("invalid endpoint URL: {}", url))
            }
            other => SyncError::Protocol(other.to_string()),
        }
    }
}

impl SyncError {
    /// Whether another attempt at the same operation could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
