//! Error types for snapshot operations

use thiserror::Error;
use vellum_vfs::VfsError;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot not found: {0}")]
    NotFound(String),

    #[error("not a snapshot name: {0}")]
    InvalidName(String),

    #[error("snapshot {name} is blocked by {handles} open handle(s)")]
    Blocked { name: String, handles: usize },

    #[error("storage error: {0}")]
    Storage(VfsError),
}

impl From<VfsError> for SnapshotError {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::DatasetBusy { name, handles } => SnapshotError::Blocked { name, handles },
            VfsError::DatasetNotFound(name) => SnapshotError::NotFound(name),
            other => SnapshotError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
