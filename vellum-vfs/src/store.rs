//! Named dataset storage
//!
//! A dataset is a self-contained directory tree under the store's data root.
//! The live workspace is one dataset with a fixed name; snapshots are
//! additional datasets created by duplication. The store tracks open handles
//! per dataset so that destructive operations can refuse to run while
//! anything still points at the data.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::errors::{Result, VfsError};

/// Fixed name of the live workspace dataset.
pub const LIVE_DATASET: &str = "workspace";

/// Manages named datasets under a single data root.
pub struct DatasetStore {
    root: PathBuf,
    handles: Arc<Mutex<HashMap<String, usize>>>,
    // Held shared by ordinary operations, exclusively by a restore. Nothing
    // may touch a dataset while a restore is replacing the live tree.
    restore_lock: RwLock<()>,
}

/// Open handle to a dataset. Dropping the handle releases it.
pub struct DatasetHandle {
    name: String,
    path: PathBuf,
    handles: Arc<Mutex<HashMap<String, usize>>>,
}

impl DatasetHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DatasetHandle {
    fn drop(&mut self) {
        if let Ok(mut handles) = self.handles.lock() {
            if let Some(count) = handles.get_mut(&self.name) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

impl DatasetStore {
    /// Open a store rooted at `root`, creating the directory if missing.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;

        Ok(Self {
            root,
            handles: Arc::new(Mutex::new(HashMap::new())),
            restore_lock: RwLock::new(()),
        })
    }

    fn dataset_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.starts_with('.')
        {
            return Err(VfsError::InvalidDatasetName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Create an empty dataset.
    pub async fn create(&self, name: &str) -> Result<()> {
        let _guard = self.restore_lock.read().await;
        let path = self.dataset_path(name)?;
        if path.exists() {
            return Err(VfsError::DatasetExists(name.to_string()));
        }
        tokio::fs::create_dir_all(&path).await?;
        info!("Created dataset: {}", name);
        Ok(())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.dataset_path(name).map(|p| p.exists()).unwrap_or(false)
    }

    /// Enumerate dataset names, unsorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Open a handle to an existing dataset.
    pub async fn acquire(&self, name: &str) -> Result<DatasetHandle> {
        let _guard = self.restore_lock.read().await;
        let path = self.dataset_path(name)?;
        if !path.exists() {
            return Err(VfsError::DatasetNotFound(name.to_string()));
        }

        let mut handles = self.handles.lock().expect("handle map poisoned");
        *handles.entry(name.to_string()).or_insert(0) += 1;

        Ok(DatasetHandle {
            name: name.to_string(),
            path,
            handles: self.handles.clone(),
        })
    }

    pub fn open_handles(&self, name: &str) -> usize {
        self.handles
            .lock()
            .map(|h| h.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Duplicate `src` under the new name `dst`. The copy is staged under a
    /// temporary name and renamed into place so a partially written dataset
    /// is never observable under `dst`.
    pub async fn duplicate(&self, src: &str, dst: &str) -> Result<()> {
        let _guard = self.restore_lock.read().await;
        let src_path = self.dataset_path(src)?;
        let dst_path = self.dataset_path(dst)?;
        if !src_path.exists() {
            return Err(VfsError::DatasetNotFound(src.to_string()));
        }
        if dst_path.exists() {
            return Err(VfsError::DatasetExists(dst.to_string()));
        }

        let staging = self.root.join(format!("{}.partial", dst));
        if staging.exists() {
            warn!("Removing stale staging directory: {:?}", staging);
            tokio::fs::remove_dir_all(&staging).await?;
        }

        let src_clone = src_path.clone();
        let staging_clone = staging.clone();
        tokio::task::spawn_blocking(move || copy_tree(&src_clone, &staging_clone))
            .await
            .map_err(|e| VfsError::Io(std::io::Error::other(e)))??;

        tokio::fs::rename(&staging, &dst_path).await?;
        debug!("Duplicated dataset {} -> {}", src, dst);
        Ok(())
    }

    /// Delete a dataset. Refuses while any handle is open.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let _guard = self.restore_lock.read().await;
        let path = self.dataset_path(name)?;
        if !path.exists() {
            return Err(VfsError::DatasetNotFound(name.to_string()));
        }

        let open = self.open_handles(name);
        if open > 0 {
            return Err(VfsError::DatasetBusy {
                name: name.to_string(),
                handles: open,
            });
        }

        tokio::fs::remove_dir_all(&path).await?;
        info!("Deleted dataset: {}", name);
        Ok(())
    }

    /// Replace the dataset `dst` with a copy of `src`, force-closing any
    /// handles still open on `dst`. Exclusive: every other store operation
    /// waits until the replacement completes. Components that held a handle
    /// to `dst` must be reinitialized afterwards.
    pub async fn replace(&self, src: &str, dst: &str) -> Result<()> {
        let _guard = self.restore_lock.write().await;
        let src_path = self.dataset_path(src)?;
        let dst_path = self.dataset_path(dst)?;
        if !src_path.exists() {
            return Err(VfsError::DatasetNotFound(src.to_string()));
        }

        {
            let mut handles = self.handles.lock().expect("handle map poisoned");
            let open = handles.insert(dst.to_string(), 0).unwrap_or(0);
            if open > 0 {
                warn!("Force-closed {} open handle(s) on dataset {}", open, dst);
            }
        }

        let staging = self.root.join(format!("{}.restoring", dst));
        if staging.exists() {
            tokio::fs::remove_dir_all(&staging).await?;
        }

        let src_clone = src_path.clone();
        let staging_clone = staging.clone();
        tokio::task::spawn_blocking(move || copy_tree(&src_clone, &staging_clone))
            .await
            .map_err(|e| VfsError::Io(std::io::Error::other(e)))??;

        if dst_path.exists() {
            tokio::fs::remove_dir_all(&dst_path).await?;
        }
        tokio::fs::rename(&staging, &dst_path).await?;

        info!("Replaced dataset {} with copy of {}", dst, src);
        Ok(())
    }

    /// Total bytes stored in a dataset.
    pub async fn dataset_size(&self, name: &str) -> Result<u64> {
        let path = self.dataset_path(name)?;
        if !path.exists() {
            return Err(VfsError::DatasetNotFound(name.to_string()));
        }
        tokio::task::spawn_blocking(move || tree_size(&path))
            .await
            .map_err(|e| VfsError::Io(std::io::Error::other(e)))?
    }
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
        }
        // Symlinks inside a dataset are not part of the workspace contract.
    }
    Ok(())
}

fn tree_size(path: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            total += tree_size(&entry.path())?;
        } else if file_type.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
