//! Workspace manifests
//!
//! A manifest describes one side's (local or remote) current file state as a
//! set of `{path, hash, modified time}` tuples, keyed by module-qualified
//! path. Hashing is deterministic: identical bytes always yield the same
//! hash, and the manifest root hash is stable under entry insertion order.

use std::collections::btree_map::{BTreeMap, Values};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One file's state within a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub content_hash: String,
    pub modified_at: DateTime<Utc>,
    pub size: u64,
    /// Tombstone for a file deleted since the last reconciled state.
    #[serde(default)]
    pub deleted: bool,
}

/// Current file state of one side, keyed by path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any previous entry for the same path.
    pub fn insert(&mut self, entry: ManifestEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<ManifestEntry> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in path order.
    pub fn entries(&self) -> Values<'_, String, ManifestEntry> {
        self.entries.values()
    }

    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    /// Deterministic digest over all entries; equal manifests always produce
    /// equal root hashes regardless of how they were assembled.
    pub fn root_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for entry in self.entries.values() {
            hasher.update(entry.path.as_bytes());
            hasher.update(entry.content_hash.as_bytes());
            hasher.update(&entry.size.to_le_bytes());
            hasher.update(&entry.modified_at.timestamp_millis().to_le_bytes());
            hasher.update(&[entry.deleted as u8]);
        }
        hex::encode(hasher.finalize().as_bytes())
    }
}

/// Content hash of a byte string, as stored in [`ManifestEntry::content_hash`].
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(blake3::hash(data).as_bytes())
}
