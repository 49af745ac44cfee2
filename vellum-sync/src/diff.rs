//! Transfer planning
//!
//! A [`TransferPlan`] is a pure function of the two manifests plus the
//! configured direction. The planner does not detect true conflicts (both
//! sides changed since the last common state); that signal comes from the
//! remote peer's check response or a `sync:conflict` push message.

use std::collections::HashSet;

use vellum_index::{Manifest, ManifestEntry};
use vellum_transport::CheckResponse;

use crate::config::SyncStrategy;

/// What one sync pass intends to move, after direction gating.
#[derive(Debug, Clone, Default)]
pub struct TransferPlan {
    /// Module-qualified paths to send to the remote.
    pub uploads: Vec<String>,
    /// Remote entries to apply locally; tombstones become local deletes.
    pub downloads: Vec<ManifestEntry>,
}

impl TransferPlan {
    /// Plan from two manifests: a path present locally with a hash absent or
    /// different remotely is queued for upload, and vice versa for
    /// downloads. Remote tombstones for paths we still have become download
    /// entries (applied as deletions).
    pub fn compute(local: &Manifest, remote: &Manifest, strategy: SyncStrategy) -> Self {
        let mut plan = TransferPlan::default();

        for entry in local.entries() {
            if entry.deleted {
                continue;
            }
            match remote.get(&entry.path) {
                None => plan.uploads.push(entry.path.clone()),
                Some(theirs) if theirs.deleted => {}
                Some(theirs) if theirs.content_hash != entry.content_hash => {
                    plan.uploads.push(entry.path.clone())
                }
                Some(_) => {}
            }
        }

        for entry in remote.entries() {
            if entry.deleted {
                if local.contains(&entry.path) {
                    plan.downloads.push(entry.clone());
                }
                continue;
            }
            match local.get(&entry.path) {
                None => plan.downloads.push(entry.clone()),
                Some(ours) if ours.content_hash != entry.content_hash => {
                    plan.downloads.push(entry.clone())
                }
                Some(_) => {}
            }
        }

        plan.gated(strategy)
    }

    /// Adopt the remote's check response, then gate by direction.
    pub fn from_check(check: &CheckResponse, strategy: SyncStrategy) -> Self {
        TransferPlan {
            uploads: check.files_to_upload.clone(),
            downloads: check.files_to_download.clone(),
        }
        .gated(strategy)
    }

    fn gated(mut self, strategy: SyncStrategy) -> Self {
        match strategy {
            SyncStrategy::Push => self.downloads.clear(),
            SyncStrategy::Pull => self.uploads.clear(),
            SyncStrategy::Bidirectional | SyncStrategy::Manual => {}
        }
        self
    }

    /// Drop every transfer touching one of `paths` (conflicted paths wait
    /// for resolution).
    pub fn exclude_paths(&mut self, paths: &HashSet<String>) {
        if paths.is_empty() {
            return;
        }
        self.uploads.retain(|p| !paths.contains(p));
        self.downloads.retain(|e| !paths.contains(&e.path));
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.downloads.is_empty()
    }

    pub fn transfer_count(&self) -> usize {
        self.uploads.len() + self.downloads.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn entry(path: &str, hash: &str) -> ManifestEntry {
        ManifestEntry {
            path: path.to_string(),
            content_hash: hash.to_string(),
            modified_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            size: 10,
            deleted: false,
        }
    }

    fn manifest(entries: &[ManifestEntry]) -> Manifest {
        let mut m = Manifest::new();
        for e in entries {
            m.insert(e.clone());
        }
        m
    }

    #[test]
    fn identical_manifests_plan_nothing() {
        let local = manifest(&[entry("/notes/a.md", "h1"), entry("/notes/b.md", "h2")]);
        let plan = TransferPlan::compute(&local, &local.clone(), SyncStrategy::Bidirectional);
        assert!(plan.is_empty());
    }

    #[test]
    fn planning_is_idempotent_without_changes() {
        let local = manifest(&[entry("/notes/a.md", "h1")]);
        let remote = manifest(&[entry("/notes/a.md", "h1")]);

        let first = TransferPlan::compute(&local, &remote, SyncStrategy::Bidirectional);
        let second = TransferPlan::compute(&local, &remote, SyncStrategy::Bidirectional);
        assert!(first.is_empty());
        assert!(second.is_empty());
    }

    #[test]
    fn divergent_hashes_queue_both_directions() {
        let local = manifest(&[entry("/notes/a.md", "h1"), entry("/notes/local.md", "l1")]);
        let remote = manifest(&[entry("/notes/a.md", "h2"), entry("/notes/remote.md", "r1")]);

        let plan = TransferPlan::compute(&local, &remote, SyncStrategy::Bidirectional);
        assert!(plan.uploads.contains(&"/notes/a.md".to_string()));
        assert!(plan.uploads.contains(&"/notes/local.md".to_string()));
        assert_eq!(plan.downloads.len(), 2);
    }

    #[test]
    fn push_strategy_discards_downloads() {
        let local = manifest(&[entry("/notes/local.md", "l1")]);
        let remote = manifest(&[entry("/notes/remote.md", "r1")]);

        let plan = TransferPlan::compute(&local, &remote, SyncStrategy::Push);
        assert_eq!(plan.uploads, vec!["/notes/local.md".to_string()]);
        assert!(plan.downloads.is_empty());
    }

    #[test]
    fn pull_strategy_discards_uploads() {
        let local = manifest(&[entry("/notes/local.md", "l1")]);
        let remote = manifest(&[entry("/notes/remote.md", "r1")]);

        let plan = TransferPlan::compute(&local, &remote, SyncStrategy::Pull);
        assert!(plan.uploads.is_empty());
        assert_eq!(plan.downloads.len(), 1);
    }

    #[test]
    fn remote_tombstone_becomes_local_delete_only_if_present() {
        let mut tomb = entry("/notes/gone.md", "h1");
        tomb.deleted = true;

        let remote = manifest(&[tomb.clone()]);
        let with_file = manifest(&[entry("/notes/gone.md", "h1")]);
        let without_file = Manifest::new();

        let plan = TransferPlan::compute(&with_file, &remote, SyncStrategy::Bidirectional);
        assert_eq!(plan.downloads.len(), 1);
        assert!(plan.downloads[0].deleted);
        assert!(plan.uploads.is_empty());

        let plan = TransferPlan::compute(&without_file, &remote, SyncStrategy::Bidirectional);
        assert!(plan.is_empty());
    }

    #[test]
    fn gating_applies_to_check_responses_too() {
        let check = CheckResponse {
            files_to_upload: vec!["/notes/up.md".to_string()],
            files_to_download: vec![entry("/notes/down.md", "h1")],
            conflicts: vec![],
        };

        let plan = TransferPlan::from_check(&check, SyncStrategy::Push);
        assert_eq!(plan.uploads.len(), 1);
        assert!(plan.downloads.is_empty());
    }

    #[test]
    fn conflicted_paths_are_excluded() {
        let mut plan = TransferPlan {
            uploads: vec!["/notes/a.md".to_string(), "/notes/b.md".to_string()],
            downloads: vec![entry("/notes/a.md", "h2")],
        };
        let mut conflicted = HashSet::new();
        conflicted.insert("/notes/a.md".to_string());

        plan.exclude_paths(&conflicted);
        assert_eq!(plan.uploads, vec!["/notes/b.md".to_string()]);
        assert!(plan.downloads.is_empty());
    }
}
