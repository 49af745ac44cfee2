//! Point-in-time snapshots of the Vellum workspace

pub mod errors;
pub mod manager;

pub use errors::{Result, SnapshotError};
pub use manager::{Snapshot, SnapshotManager, SNAPSHOT_PREFIX};
