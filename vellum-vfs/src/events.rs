//! Change events for workspace files
//!
//! Events are fanned out on a tokio broadcast channel. The `DiskVfs` emits
//! them directly for mutations that go through the VFS API, and a `notify`
//! watcher bridges in edits made behind its back (the editor writing files
//! directly).

use std::path::Path;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::errors::{Result, VfsError};

/// Kind of change observed on a workspace path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsEventKind {
    Created,
    Modified,
    Deleted,
}

/// A change to one workspace file, identified by its module-qualified path.
#[derive(Debug, Clone)]
pub struct VfsEvent {
    pub path: String,
    pub kind: VfsEventKind,
}

/// Start a notify watcher on `root`, translating filesystem events into
/// module-qualified [`VfsEvent`]s on `sender`. The watcher stops when the
/// returned value is dropped.
pub fn spawn_watcher(
    root: &Path,
    sender: broadcast::Sender<VfsEvent>,
) -> Result<RecommendedWatcher> {
    let root_owned = root.to_path_buf();
    let mut watcher =
        notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let kind = match event.kind {
                        EventKind::Create(_) => VfsEventKind::Created,
                        EventKind::Modify(_) => VfsEventKind::Modified,
                        EventKind::Remove(_) => VfsEventKind::Deleted,
                        _ => return,
                    };
                    for path in &event.paths {
                        if let Some(qualified) = qualify(&root_owned, path) {
                            // Send failures just mean nobody is subscribed.
                            let _ = sender.send(VfsEvent {
                                path: qualified,
                                kind,
                            });
                        }
                    }
                }
                Err(e) => error!("File watcher error: {}", e),
            }
        })
        .map_err(|e| VfsError::Watcher(e.to_string()))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| VfsError::Watcher(e.to_string()))?;

    debug!("Watching workspace root: {:?}", root);
    Ok(watcher)
}

/// Turn an absolute filesystem path back into `/module/relative/path`.
fn qualify(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let rel = rel.to_str()?;
    if rel.is_empty() {
        return None;
    }
    Some(format!("/{}", rel.replace('\\', "/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn qualify_strips_root() {
        let root = PathBuf::from("/data/workspace");
        let path = PathBuf::from("/data/workspace/notes/a.md");
        assert_eq!(qualify(&root, &path).as_deref(), Some("/notes/a.md"));
    }

    #[test]
    fn qualify_rejects_foreign_paths() {
        let root = PathBuf::from("/data/workspace");
        let path = PathBuf::from("/data/other/notes/a.md");
        assert_eq!(qualify(&root, &path), None);
    }
}
