//! Conflict records and resolution policy
//!
//! A conflict is a path where local and remote diverged since the last
//! reconciled state. Once resolved it is removed from the active set and
//! never mutated again; a later divergence on the same path produces a new
//! conflict instance with a new id.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vellum_index::ManifestEntry;
use vellum_transport::{ChangeSignature, ConflictKind, RemoteConflict};

use crate::config::ConflictPolicy;

/// Which side a resolution keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictChoice {
    Local,
    Remote,
}

impl ConflictChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictChoice::Local => "local",
            ConflictChoice::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub id: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub local_change: ChangeSignature,
    pub remote_change: ChangeSignature,
    pub resolved: bool,
    pub resolution: Option<ConflictChoice>,
}

impl SyncConflict {
    /// Build from a remote divergence report, preferring the remote's own
    /// view of our version and falling back to the local manifest entry.
    pub fn from_remote(remote: RemoteConflict, local_entry: Option<&ManifestEntry>) -> Self {
        let local_change = remote.local.clone().unwrap_or_else(|| {
            local_entry
                .map(|e| ChangeSignature {
                    timestamp: e.modified_at,
                    size: e.size,
                    hash: e.content_hash.clone(),
                })
                .unwrap_or(ChangeSignature {
                    timestamp: DateTime::<Utc>::UNIX_EPOCH,
                    size: 0,
                    hash: String::new(),
                })
        });

        Self {
            id: remote
                .id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            path: remote.path,
            kind: remote.kind,
            local_change,
            remote_change: remote.remote,
            resolved: false,
            resolution: None,
        }
    }
}

/// Pick a side per policy, or `None` when the policy defers to the user.
/// `NewerWins` with equal timestamps falls back to the remote side.
pub fn decide(policy: ConflictPolicy, conflict: &SyncConflict) -> Option<ConflictChoice> {
    match policy {
        ConflictPolicy::ServerWins => Some(ConflictChoice::Remote),
        ConflictPolicy::ClientWins => Some(ConflictChoice::Local),
        ConflictPolicy::NewerWins => {
            if conflict.local_change.timestamp > conflict.remote_change.timestamp {
                Some(ConflictChoice::Local)
            } else {
                Some(ConflictChoice::Remote)
            }
        }
        ConflictPolicy::Manual => None,
    }
}

/// The set of outstanding (unresolved) conflicts.
#[derive(Default)]
pub struct ConflictRegistry {
    active: Mutex<BTreeMap<String, SyncConflict>>,
}

impl ConflictRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conflict. A newer report for the same path supersedes any
    /// outstanding one.
    pub fn insert(&self, conflict: SyncConflict) {
        let mut active = self.active.lock().expect("conflict registry poisoned");
        active.retain(|_, c| c.path != conflict.path);
        active.insert(conflict.id.clone(), conflict);
    }

    /// Remove and return a conflict for resolution.
    pub fn take(&self, id: &str) -> Option<SyncConflict> {
        self.active
            .lock()
            .expect("conflict registry poisoned")
            .remove(id)
    }

    pub fn list(&self) -> Vec<SyncConflict> {
        self.active
            .lock()
            .expect("conflict registry poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn paths(&self) -> HashSet<String> {
        self.active
            .lock()
            .expect("conflict registry poisoned")
            .values()
            .map(|c| c.path.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.active.lock().expect("conflict registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(secs: i64, hash: &str) -> ChangeSignature {
        ChangeSignature {
            timestamp: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
            size: 10,
            hash: hash.to_string(),
        }
    }

    fn conflict(local_secs: i64, remote_secs: i64) -> SyncConflict {
        SyncConflict {
            id: "c-1".to_string(),
            path: "/notes/a.md".to_string(),
            kind: ConflictKind::Content,
            local_change: signature(local_secs, "h1"),
            remote_change: signature(remote_secs, "h2"),
            resolved: false,
            resolution: None,
        }
    }

    #[test]
    fn server_wins_always_remote() {
        assert_eq!(
            decide(ConflictPolicy::ServerWins, &conflict(200, 100)),
            Some(ConflictChoice::Remote)
        );
    }

    #[test]
    fn client_wins_always_local() {
        assert_eq!(
            decide(ConflictPolicy::ClientWins, &conflict(100, 200)),
            Some(ConflictChoice::Local)
        );
    }

    #[test]
    fn newer_wins_compares_timestamps() {
        assert_eq!(
            decide(ConflictPolicy::NewerWins, &conflict(200, 100)),
            Some(ConflictChoice::Local)
        );
        assert_eq!(
            decide(ConflictPolicy::NewerWins, &conflict(100, 200)),
            Some(ConflictChoice::Remote)
        );
    }

    #[test]
    fn newer_wins_tie_prefers_remote() {
        // Equal timestamps resolve to the remote side, so a tie never
        // schedules an upload the server did not ask for.
        assert_eq!(
            decide(ConflictPolicy::NewerWins, &conflict(100, 100)),
            Some(ConflictChoice::Remote)
        );
    }

    #[test]
    fn manual_defers() {
        assert_eq!(decide(ConflictPolicy::Manual, &conflict(100, 200)), None);
    }

    #[test]
    fn later_report_supersedes_same_path() {
        let registry = ConflictRegistry::new();
        registry.insert(conflict(100, 200));

        let mut newer = conflict(100, 300);
        newer.id = "c-2".to_string();
        registry.insert(newer);

        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "c-2");
    }

    #[test]
    fn take_removes_from_active_set() {
        let registry = ConflictRegistry::new();
        registry.insert(conflict(100, 200));
        assert!(registry.take("c-1").is_some());
        assert!(registry.take("c-1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn remote_report_without_id_gets_fresh_id() {
        let report = RemoteConflict {
            id: None,
            path: "/notes/a.md".to_string(),
            kind: ConflictKind::Content,
            local: None,
            remote: signature(100, "h2"),
        };
        let a = SyncConflict::from_remote(report.clone(), None);
        let b = SyncConflict::from_remote(report, None);
        assert_ne!(a.id, b.id);
    }
}
