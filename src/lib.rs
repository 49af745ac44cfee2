//! Vellum synchronization engine
//!
//! Umbrella crate re-exporting the engine's public surface:
//! - [`vfs`]: virtual file system contract, dataset store, change events
//! - [`index`]: manifests and the change indexer
//! - [`transport`]: HTTP transport, push channel, backoff
//! - [`snapshot`]: point-in-time workspace snapshots
//! - [`sync`]: transfer planning, conflicts, and the sync state machine

pub use vellum_index as index;
pub use vellum_snapshot as snapshot;
pub use vellum_sync as sync;
pub use vellum_transport as transport;
pub use vellum_vfs as vfs;

pub use vellum_snapshot::{Snapshot, SnapshotManager};
pub use vellum_sync::{
    ConflictChoice, ConflictPolicy, PassSummary, SyncConfig, SyncEngine, SyncMode, SyncState,
    SyncStatus, SyncStrategy,
};
pub use vellum_transport::{HttpTransport, PushChannel, Transport};
pub use vellum_vfs::{DatasetStore, DiskVfs, Vfs, LIVE_DATASET};
