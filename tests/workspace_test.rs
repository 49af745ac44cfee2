//! Cross-crate integration: snapshot rollback around workspace mutation
//!
//! A restore replaces the live dataset and force-closes open handles, so
//! every component holding one must be reinitialized afterwards; this test
//! exercises that full cycle through the facade crate.

use std::sync::Arc;

use tempfile::tempdir;
use vellum::{DatasetStore, DiskVfs, SnapshotManager, Vfs, LIVE_DATASET};

#[tokio::test]
async fn snapshot_restores_workspace_byte_identical() {
    let dir = tempdir().unwrap();
    let store = Arc::new(DatasetStore::open(dir.path()).await.unwrap());
    store.create(LIVE_DATASET).await.unwrap();

    let handle = store.acquire(LIVE_DATASET).await.unwrap();
    let vfs = DiskVfs::open(handle).await.unwrap();
    vfs.write("/notes/a.md", b"before").await.unwrap();
    vfs.write("/notes/deep/b.md", b"keep me").await.unwrap();

    let snapshots = SnapshotManager::new(store.clone());
    let snapshot = snapshots.create_snapshot().await.unwrap();
    assert!(snapshot.size_estimate > 0);

    // Mutate the live workspace after the snapshot.
    vfs.write("/notes/a.md", b"after").await.unwrap();
    vfs.remove("/notes/deep/b.md").await.unwrap();
    drop(vfs);

    snapshots.restore_snapshot(&snapshot.name).await.unwrap();

    // Reinitialize against the restored dataset.
    let handle = store.acquire(LIVE_DATASET).await.unwrap();
    let vfs = DiskVfs::open(handle).await.unwrap();
    assert_eq!(&vfs.read("/notes/a.md").await.unwrap()[..], b"before");
    assert_eq!(&vfs.read("/notes/deep/b.md").await.unwrap()[..], b"keep me");

    // The snapshot itself is unaffected and can be deleted once released.
    snapshots.delete_snapshot(&snapshot.name).await.unwrap();
    assert!(snapshots.list_snapshots().await.unwrap().is_empty());
}
