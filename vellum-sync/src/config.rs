//! Sync configuration
//!
//! One JSON document persisted verbatim at a fixed path inside the reserved
//! `config` module. Loaded once at engine startup; every mutation goes
//! through an explicit save that writes immediately. All sub-structs are
//! defaulted so a partial document from an older version still loads.

use serde::{Deserialize, Serialize};
use vellum_index::FilterSet;
use vellum_vfs::{Vfs, VfsError};

use crate::errors::Result;

/// Where the configuration document lives inside the workspace.
pub const CONFIG_PATH: &str = "/config/sync.json";

/// Configured sync direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Sync only when triggered explicitly.
    Manual,
    Bidirectional,
    /// Upload only; downloads are discarded.
    Push,
    /// Download only; uploads are discarded.
    Pull,
}

impl Default for SyncStrategy {
    fn default() -> Self {
        SyncStrategy::Manual
    }
}

/// Policy applied to divergent paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    ServerWins,
    ClientWins,
    NewerWins,
    Manual,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        ConflictPolicy::Manual
    }
}

/// Which transports are used to reach the remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Request/response only.
    Http,
    /// Request/response plus the persistent push channel.
    Websocket,
}

impl Default for TransportMode {
    fn default() -> Self {
        TransportMode::Http
    }
}

/// Opaque credential pass-through; the engine never inspects these beyond
/// checking presence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Credentials {
    pub username: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkingConfig {
    pub enabled: bool,
    /// Size of each piece of a chunked transfer.
    pub chunk_size: usize,
    /// Files at or above this size are sent in pieces.
    pub threshold: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size: 1024 * 1024,
            threshold: 4 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    Gzip,
    Zstd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompressionConfig {
    pub enabled: bool,
    pub algorithm: CompressionAlgorithm,
    /// Payloads smaller than this are sent uncompressed.
    pub min_size: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: CompressionAlgorithm::Gzip,
            min_size: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    pub endpoint: String,
    pub credentials: Credentials,
    pub strategy: SyncStrategy,
    #[serde(rename = "conflictResolution")]
    pub conflict_policy: ConflictPolicy,
    pub auto_sync: bool,
    pub auto_sync_interval_minutes: u64,
    pub transport: TransportMode,
    pub chunking: ChunkingConfig,
    pub compression: CompressionConfig,
    pub filters: FilterSet,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            credentials: Credentials::default(),
            strategy: SyncStrategy::default(),
            conflict_policy: ConflictPolicy::default(),
            auto_sync: false,
            auto_sync_interval_minutes: 15,
            transport: TransportMode::default(),
            chunking: ChunkingConfig::default(),
            compression: CompressionConfig::default(),
            filters: FilterSet::default(),
        }
    }
}

impl SyncConfig {
    /// Load the persisted document, or defaults when none exists yet.
    pub async fn load(vfs: &dyn Vfs) -> Result<Self> {
        match vfs.read(CONFIG_PATH).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(VfsError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist immediately.
    pub async fn save(&self, vfs: &dyn Vfs) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        vfs.write(CONFIG_PATH, &data).await?;
        Ok(())
    }

    /// What, if anything, prevents a sync pass from starting.
    pub fn missing_requirement(&self) -> Option<&'static str> {
        if self.endpoint.trim().is_empty() {
            return Some("no sync endpoint configured");
        }
        if self.credentials.username.trim().is_empty() && self.credentials.token.is_none() {
            return Some("no credentials configured");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;
    use vellum_vfs::{DatasetStore, DiskVfs};

    async fn workspace(dir: &tempfile::TempDir) -> Arc<dyn Vfs> {
        let store = DatasetStore::open(dir.path()).await.unwrap();
        store.create("workspace").await.unwrap();
        let handle = store.acquire("workspace").await.unwrap();
        Arc::new(DiskVfs::open(handle).await.unwrap())
    }

    #[test]
    fn partial_document_fills_defaults() {
        let cfg: SyncConfig = serde_json::from_str(
            r#"{"endpoint": "https://sync.example.com", "strategy": "push"}"#,
        )
        .unwrap();
        assert_eq!(cfg.strategy, SyncStrategy::Push);
        assert_eq!(cfg.auto_sync_interval_minutes, 15);
        assert!(cfg.chunking.enabled);
        assert_eq!(cfg.conflict_policy, ConflictPolicy::Manual);
    }

    #[test]
    fn field_names_match_persisted_document() {
        let json = serde_json::to_string(&SyncConfig::default()).unwrap();
        assert!(json.contains("\"conflictResolution\""));
        assert!(json.contains("\"autoSyncIntervalMinutes\""));
        assert!(json.contains("\"maxFileSize\""));
    }

    #[test]
    fn missing_requirements_detected() {
        let mut cfg = SyncConfig::default();
        assert!(cfg.missing_requirement().is_some());

        cfg.endpoint = "https://sync.example.com".to_string();
        assert!(cfg.missing_requirement().is_some());

        cfg.credentials.username = "ada".to_string();
        assert!(cfg.missing_requirement().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let vfs = workspace(&dir).await;

        let mut cfg = SyncConfig::default();
        cfg.endpoint = "https://sync.example.com".to_string();
        cfg.strategy = SyncStrategy::Bidirectional;
        cfg.save(vfs.as_ref()).await.unwrap();

        let loaded = SyncConfig::load(vfs.as_ref()).await.unwrap();
        assert_eq!(loaded, cfg);
    }

    #[tokio::test]
    async fn load_without_document_yields_defaults() {
        let dir = tempdir().unwrap();
        let vfs = workspace(&dir).await;
        let cfg = SyncConfig::load(vfs.as_ref()).await.unwrap();
        assert_eq!(cfg, SyncConfig::default());
    }
}
