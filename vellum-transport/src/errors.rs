//! Error types for transport operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("push channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
