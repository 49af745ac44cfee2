//! Error types for indexing operations

use thiserror::Error;
use vellum_vfs::VfsError;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("VFS error: {0}")]
    Vfs(#[from] VfsError),

    #[error("hashing task failed: {0}")]
    HashTask(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
