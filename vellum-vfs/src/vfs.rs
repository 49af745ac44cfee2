//! Virtual file system over a workspace dataset
//!
//! Paths are module-qualified: `/module/relative/path`. The first segment
//! names a module; the reserved `config` and `trash` modules are excluded
//! from module enumeration but remain readable and writable.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use notify::RecommendedWatcher;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::errors::{Result, VfsError};
use crate::events::{spawn_watcher, VfsEvent, VfsEventKind};
use crate::store::DatasetHandle;

/// Reserved module holding persisted configuration documents.
pub const CONFIG_MODULE: &str = "config";
/// Reserved module holding soft-deleted files.
pub const TRASH_MODULE: &str = "trash";

const SYSTEM_MODULES: &[&str] = &[CONFIG_MODULE, TRASH_MODULE];

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// True when a module-qualified path lives inside a reserved system module.
pub fn is_system_path(path: &str) -> bool {
    match split_module(path) {
        Ok((module, _)) => SYSTEM_MODULES.contains(&module),
        Err(_) => false,
    }
}

/// Split `/module/relative/path` into `(module, relative)`.
pub fn split_module(path: &str) -> Result<(&str, &str)> {
    let stripped = path
        .strip_prefix('/')
        .ok_or_else(|| VfsError::InvalidPath(path.to_string()))?;
    let (module, rest) = stripped
        .split_once('/')
        .ok_or_else(|| VfsError::InvalidPath(path.to_string()))?;
    if module.is_empty() || rest.is_empty() {
        return Err(VfsError::InvalidPath(path.to_string()));
    }
    Ok((module, rest))
}

/// Metadata for one workspace file.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

/// The file system contract consumed by the sync engine.
#[async_trait]
pub trait Vfs: Send + Sync {
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Write file content, creating missing parent directories.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    async fn remove(&self, path: &str) -> Result<()>;

    async fn metadata(&self, path: &str) -> Result<FileInfo>;

    /// Module-qualified paths of every file under one module, sorted.
    async fn list_files(&self, module: &str) -> Result<Vec<String>>;

    /// Mounted modules, excluding reserved system modules, sorted.
    async fn list_modules(&self) -> Result<Vec<String>>;

    async fn mount(&self, module: &str) -> Result<()>;

    async fn unmount(&self, module: &str) -> Result<()>;

    /// Stable opaque id for a path.
    fn resolve_id(&self, path: &str) -> String;

    /// Reverse lookup for an id previously handed out by `resolve_id`.
    fn path_of(&self, id: &str) -> Option<String>;

    fn subscribe(&self) -> broadcast::Receiver<VfsEvent>;
}

/// Disk-backed VFS over an open dataset handle.
pub struct DiskVfs {
    handle: DatasetHandle,
    mounted: RwLock<HashSet<String>>,
    ids: RwLock<HashMap<String, String>>,
    events: broadcast::Sender<VfsEvent>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl DiskVfs {
    /// Open a VFS over a dataset, mounting every module directory already
    /// present on disk.
    pub async fn open(handle: DatasetHandle) -> Result<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut mounted = HashSet::new();

        let mut entries = tokio::fs::read_dir(handle.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    mounted.insert(name.to_string());
                }
            }
        }

        Ok(Self {
            handle,
            mounted: RwLock::new(mounted),
            ids: RwLock::new(HashMap::new()),
            events,
            watcher: Mutex::new(None),
        })
    }

    /// Start watching the dataset for edits made outside the VFS API.
    pub fn watch(&self) -> Result<()> {
        let watcher = spawn_watcher(self.handle.path(), self.events.clone())?;
        *self.watcher.lock().expect("watcher lock poisoned") = Some(watcher);
        Ok(())
    }

    /// Stop the filesystem watcher. Events emitted by VFS mutations continue.
    pub fn stop_watching(&self) {
        self.watcher.lock().expect("watcher lock poisoned").take();
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let (module, rest) = split_module(path)?;
        if rest.split('/').any(|seg| seg == ".." || seg.is_empty()) {
            return Err(VfsError::InvalidPath(path.to_string()));
        }
        Ok(self.handle.path().join(module).join(rest))
    }

    fn emit(&self, path: &str, kind: VfsEventKind) {
        let _ = self.events.send(VfsEvent {
            path: path.to_string(),
            kind,
        });
    }

    async fn collect_files(
        &self,
        module: &str,
        dir: PathBuf,
        out: &mut Vec<String>,
    ) -> Result<()> {
        let mut pending = vec![dir];
        let base = self.handle.path().join(module);

        while let Some(current) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    match path.strip_prefix(&base) {
                        Ok(rel) => {
                            let rel = rel.to_string_lossy().replace('\\', "/");
                            out.push(format!("/{}/{}", module, rel));
                        }
                        Err(_) => warn!("Skipping file outside module root: {:?}", path),
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Vfs for DiskVfs {
    async fn read(&self, path: &str) -> Result<Bytes> {
        let target = self.resolve(path)?;
        trace!("read {}", path);
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VfsError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        let existed = target.exists();
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, data).await?;
        trace!("write {} ({} bytes)", path, data.len());

        // Writing into a fresh module mounts it implicitly.
        let (module, _) = split_module(path)?;
        self.mounted
            .write()
            .expect("mounted lock poisoned")
            .insert(module.to_string());

        self.emit(
            path,
            if existed {
                VfsEventKind::Modified
            } else {
                VfsEventKind::Created
            },
        );
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                self.emit(path, VfsEventKind::Deleted);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VfsError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn metadata(&self, path: &str) -> Result<FileInfo> {
        let target = self.resolve(path)?;
        let meta = match tokio::fs::metadata(&target).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VfsError::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(FileInfo {
            path: path.to_string(),
            size: meta.len(),
            modified_at: DateTime::from(meta.modified()?),
        })
    }

    async fn list_files(&self, module: &str) -> Result<Vec<String>> {
        let dir = self.handle.path().join(module);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        self.collect_files(module, dir, &mut files).await?;
        files.sort();
        Ok(files)
    }

    async fn list_modules(&self) -> Result<Vec<String>> {
        let mounted = self.mounted.read().expect("mounted lock poisoned");
        let mut modules: Vec<String> = mounted
            .iter()
            .filter(|m| !SYSTEM_MODULES.contains(&m.as_str()))
            .cloned()
            .collect();
        modules.sort();
        Ok(modules)
    }

    async fn mount(&self, module: &str) -> Result<()> {
        if module.is_empty() || module.contains('/') {
            return Err(VfsError::InvalidPath(module.to_string()));
        }
        tokio::fs::create_dir_all(self.handle.path().join(module)).await?;
        self.mounted
            .write()
            .expect("mounted lock poisoned")
            .insert(module.to_string());
        Ok(())
    }

    async fn unmount(&self, module: &str) -> Result<()> {
        self.mounted
            .write()
            .expect("mounted lock poisoned")
            .remove(module);
        Ok(())
    }

    fn resolve_id(&self, path: &str) -> String {
        let digest = blake3::hash(path.as_bytes());
        let id = hex::encode(&digest.as_bytes()[..8]);
        self.ids
            .write()
            .expect("id map poisoned")
            .insert(id.clone(), path.to_string());
        id
    }

    fn path_of(&self, id: &str) -> Option<String> {
        self.ids.read().expect("id map poisoned").get(id).cloned()
    }

    fn subscribe(&self) -> broadcast::Receiver<VfsEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DatasetStore;
    use tempfile::tempdir;

    async fn test_vfs(dir: &tempfile::TempDir) -> DiskVfs {
        let store = DatasetStore::open(dir.path()).await.unwrap();
        store.create("workspace").await.unwrap();
        let handle = store.acquire("workspace").await.unwrap();
        DiskVfs::open(handle).await.unwrap()
    }

    #[tokio::test]
    async fn write_creates_parents_and_read_round_trips() {
        let dir = tempdir().unwrap();
        let vfs = test_vfs(&dir).await;

        vfs.write("/notes/deep/nested/a.md", b"hello").await.unwrap();
        let data = vfs.read("/notes/deep/nested/a.md").await.unwrap();
        assert_eq!(&data[..], b"hello");
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let vfs = test_vfs(&dir).await;
        let err = vfs.read("/notes/missing.md").await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_modules_excludes_system_modules() {
        let dir = tempdir().unwrap();
        let vfs = test_vfs(&dir).await;

        vfs.mount("notes").await.unwrap();
        vfs.mount("attachments").await.unwrap();
        vfs.mount(CONFIG_MODULE).await.unwrap();
        vfs.mount(TRASH_MODULE).await.unwrap();

        let modules = vfs.list_modules().await.unwrap();
        assert_eq!(modules, vec!["attachments", "notes"]);
    }

    #[tokio::test]
    async fn list_files_walks_subdirectories() {
        let dir = tempdir().unwrap();
        let vfs = test_vfs(&dir).await;

        vfs.write("/notes/a.md", b"a").await.unwrap();
        vfs.write("/notes/sub/b.md", b"b").await.unwrap();
        vfs.write("/other/c.md", b"c").await.unwrap();

        let files = vfs.list_files("notes").await.unwrap();
        assert_eq!(files, vec!["/notes/a.md", "/notes/sub/b.md"]);
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = tempdir().unwrap();
        let vfs = test_vfs(&dir).await;
        assert!(vfs.write("/notes/../escape.md", b"x").await.is_err());
        assert!(vfs.read("relative/path.md").await.is_err());
    }

    #[tokio::test]
    async fn mutations_emit_events() {
        let dir = tempdir().unwrap();
        let vfs = test_vfs(&dir).await;
        let mut rx = vfs.subscribe();

        vfs.write("/notes/a.md", b"1").await.unwrap();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.path, "/notes/a.md");
        assert_eq!(ev.kind, VfsEventKind::Created);

        vfs.write("/notes/a.md", b"2").await.unwrap();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, VfsEventKind::Modified);

        vfs.remove("/notes/a.md").await.unwrap();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, VfsEventKind::Deleted);
    }

    #[tokio::test]
    async fn id_resolution_round_trips() {
        let dir = tempdir().unwrap();
        let vfs = test_vfs(&dir).await;
        let id = vfs.resolve_id("/notes/a.md");
        assert_eq!(vfs.path_of(&id).as_deref(), Some("/notes/a.md"));
        assert_eq!(vfs.path_of("unknown"), None);
    }

    #[test]
    fn system_path_detection() {
        assert!(is_system_path("/config/sync.json"));
        assert!(is_system_path("/trash/old.md"));
        assert!(!is_system_path("/notes/a.md"));
    }
}
