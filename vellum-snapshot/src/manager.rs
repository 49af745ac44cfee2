//! Whole-workspace snapshots
//!
//! A snapshot is an immutable duplicate of the live dataset under a name
//! derived from the creation instant. Restoring copies a snapshot back over
//! the live dataset; that path is destructive and exclusive, and every
//! component holding a handle to the old dataset must be reinitialized
//! afterwards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vellum_vfs::{DatasetStore, LIVE_DATASET};

use crate::errors::{Result, SnapshotError};

/// Reserved prefix; dataset names carrying it are snapshots. Distinct from
/// [`LIVE_DATASET`], so a snapshot name can never collide with the live
/// dataset name.
pub const SNAPSHOT_PREFIX: &str = "workspace_snapshot";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub size_estimate: u64,
}

pub struct SnapshotManager {
    store: Arc<DatasetStore>,
}

impl SnapshotManager {
    pub fn new(store: Arc<DatasetStore>) -> Self {
        Self { store }
    }

    fn snapshot_name(millis: i64) -> String {
        format!("{}_{}", SNAPSHOT_PREFIX, millis)
    }

    /// Parse the creation instant embedded in a snapshot name.
    fn parse_name(name: &str) -> Option<DateTime<Utc>> {
        let millis: i64 = name
            .strip_prefix(SNAPSHOT_PREFIX)?
            .strip_prefix('_')?
            .parse()
            .ok()?;
        DateTime::from_timestamp_millis(millis)
    }

    /// Duplicate the live dataset under a fresh timestamped name. Returns
    /// once the duplicate is durable on disk. Two snapshots within the same
    /// millisecond advance the instant until the name is free.
    pub async fn create_snapshot(&self) -> Result<Snapshot> {
        let mut millis = Utc::now().timestamp_millis();
        while self.store.exists(&Self::snapshot_name(millis)) {
            millis += 1;
        }
        let name = Self::snapshot_name(millis);

        self.store.duplicate(LIVE_DATASET, &name).await?;
        let size_estimate = self.store.dataset_size(&name).await?;

        info!("Created snapshot {} ({} bytes)", name, size_estimate);
        Ok(Snapshot {
            name,
            created_at: DateTime::from_timestamp_millis(millis)
                .unwrap_or_else(Utc::now),
            size_estimate,
        })
    }

    /// All snapshots, most recent first.
    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        for name in self.store.list().await? {
            let Some(created_at) = Self::parse_name(&name) else {
                continue;
            };
            let size_estimate = match self.store.dataset_size(&name).await {
                Ok(size) => size,
                Err(e) => {
                    warn!("Could not size snapshot {}: {}", name, e);
                    0
                }
            };
            snapshots.push(Snapshot {
                name,
                created_at,
                size_estimate,
            });
        }
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(snapshots)
    }

    /// Copy the named snapshot over the live dataset. Destructive, not
    /// undoable except by restoring a different snapshot, and exclusive:
    /// all other dataset operations are blocked until it completes.
    pub async fn restore_snapshot(&self, name: &str) -> Result<()> {
        if Self::parse_name(name).is_none() {
            return Err(SnapshotError::InvalidName(name.to_string()));
        }
        if !self.store.exists(name) {
            return Err(SnapshotError::NotFound(name.to_string()));
        }

        self.store.replace(name, LIVE_DATASET).await?;
        info!("Restored snapshot {} over live dataset", name);
        Ok(())
    }

    /// Delete a snapshot. If deletion is blocked by lingering open handles
    /// the condition is surfaced; it is never forced.
    pub async fn delete_snapshot(&self, name: &str) -> Result<()> {
        if Self::parse_name(name).is_none() {
            return Err(SnapshotError::InvalidName(name.to_string()));
        }
        self.store.delete(name).await?;
        Ok(())
    }
}
