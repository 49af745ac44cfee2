//! Change indexer
//!
//! Walks every non-system module of the workspace, reads full file content
//! and produces a [`Manifest`] of content hashes. Cost is O(total bytes
//! read) per invocation; there is no cross-run hash cache. Hashing is
//! CPU-bound and runs on the blocking pool so the async runtime is never
//! stalled by a large file.

use std::sync::Arc;

use tracing::{debug, info, warn};
use vellum_vfs::Vfs;

use crate::errors::{IndexError, Result};
use crate::filters::FilterSet;
use crate::manifest::{hash_bytes, Manifest, ManifestEntry};

pub struct ChangeIndexer {
    vfs: Arc<dyn Vfs>,
    filters: FilterSet,
}

impl ChangeIndexer {
    pub fn new(vfs: Arc<dyn Vfs>, filters: FilterSet) -> Self {
        Self { vfs, filters }
    }

    /// Index every file reachable under the non-system modules. A single
    /// unreadable file is skipped with a warning; indexing continues.
    pub async fn build_manifest(&self) -> Result<Manifest> {
        let mut manifest = Manifest::new();
        let modules = self.vfs.list_modules().await?;
        debug!("Indexing {} module(s)", modules.len());

        let mut skipped = 0usize;
        for module in &modules {
            let files = self.vfs.list_files(module).await?;
            for path in files {
                match self.index_file(&path).await {
                    Ok(Some(entry)) => manifest.insert(entry),
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Failed to index {}: {}", path, e);
                        skipped += 1;
                    }
                }
            }
        }

        info!(
            "Indexed {} file(s), {} total bytes, {} skipped",
            manifest.len(),
            manifest.total_size(),
            skipped
        );
        Ok(manifest)
    }

    async fn index_file(&self, path: &str) -> Result<Option<ManifestEntry>> {
        if !self.filters.allows_path(path) {
            return Ok(None);
        }

        let info = self.vfs.metadata(path).await?;
        if !self.filters.allows_size(info.size) {
            debug!("Skipping {} (over size limit)", path);
            return Ok(None);
        }

        let data = self.vfs.read(path).await?;
        if !self.filters.allows_content(&data) {
            debug!("Skipping {} (binary content)", path);
            return Ok(None);
        }

        let content_hash = tokio::task::spawn_blocking(move || hash_bytes(&data))
            .await
            .map_err(|e| IndexError::HashTask(e.to_string()))?;

        Ok(Some(ManifestEntry {
            path: path.to_string(),
            content_hash,
            modified_at: info.modified_at,
            size: info.size,
            deleted: false,
        }))
    }
}
