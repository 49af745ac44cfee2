//! Error types for VFS and dataset operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VfsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("dataset already exists: {0}")]
    DatasetExists(String),

    #[error("dataset busy: {name} has {handles} open handle(s)")]
    DatasetBusy { name: String, handles: usize },

    #[error("invalid dataset name: {0}")]
    InvalidDatasetName(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("watcher error: {0}")]
    Watcher(String),
}

pub type Result<T> = std::result::Result<T, VfsError>;
