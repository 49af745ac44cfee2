//! Synchronization engine for the Vellum workspace
//!
//! Reconciles the local virtual file system against a single configured
//! remote peer, detects and resolves conflicting edits, and reports status
//! and progress through a typed event bus. Point-in-time rollback lives in
//! the companion `vellum-snapshot` crate.

pub mod compress;
pub mod config;
pub mod conflict;
pub mod diff;
pub mod engine;
pub mod errors;
pub mod events;
pub mod logs;
pub mod state;
pub mod transfer;

pub use config::{
    ChunkingConfig, CompressionAlgorithm, CompressionConfig, ConflictPolicy, Credentials,
    SyncConfig, SyncStrategy, TransportMode, CONFIG_PATH,
};
pub use conflict::{decide, ConflictChoice, ConflictRegistry, SyncConflict};
pub use diff::TransferPlan;
pub use engine::{PassSummary, SyncEngine, SyncMode};
pub use errors::{Result, SyncError};
pub use events::{EventBus, Subscription, SyncEvent, SyncEventKind};
pub use logs::{LogLevel, SyncLog, SyncLogEntry};
pub use state::{ConnectionInfo, SyncPhase, SyncProgress, SyncState, SyncStatus};
pub use transfer::{BatchReport, RetryPolicy, TransferExecutor, TransferTick};
