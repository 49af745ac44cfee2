//! Wire types shared by the request/response surface and the push channel

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vellum_index::ManifestEntry;

/// Timestamp/size/hash triple describing one side's version of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSignature {
    pub timestamp: DateTime<Utc>,
    pub size: u64,
    pub hash: String,
}

/// How two sides of a path diverged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Content,
    Delete,
    Move,
    Metadata,
}

/// Divergence reported by the remote peer, either in a check response or on
/// the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConflict {
    /// The remote's identifier for this conflict, when it assigns one.
    #[serde(default)]
    pub id: Option<String>,
    pub path: String,
    pub kind: ConflictKind,
    /// The remote's view of the client's version, when it has one.
    #[serde(default)]
    pub local: Option<ChangeSignature>,
    pub remote: ChangeSignature,
}

/// Response body of `POST /api/sync/check`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResponse {
    #[serde(default)]
    pub files_to_upload: Vec<String>,
    #[serde(default)]
    pub files_to_download: Vec<ManifestEntry>,
    #[serde(default)]
    pub conflicts: Vec<RemoteConflict>,
}

/// Messages arriving on the realtime push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PushMessage {
    #[serde(rename = "sync:changes")]
    Changes { paths: Vec<String> },
    #[serde(rename = "sync:conflict")]
    Conflict {
        #[serde(flatten)]
        conflict: RemoteConflict,
    },
    #[serde(rename = "sync:progress")]
    Progress { phase: String, current: u64, total: u64 },
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
}

/// Encoding applied to transfer bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    Identity,
    Gzip,
    Zstd,
}

impl PayloadEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadEncoding::Identity => "identity",
            PayloadEncoding::Gzip => "gzip",
            PayloadEncoding::Zstd => "zstd",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "identity" => Some(PayloadEncoding::Identity),
            "gzip" => Some(PayloadEncoding::Gzip),
            "zstd" => Some(PayloadEncoding::Zstd),
            _ => None,
        }
    }
}

/// Position of one piece within a chunked transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub index: u32,
    pub count: u32,
}

/// Bytes traveling in either direction, with their wire metadata.
#[derive(Debug, Clone)]
pub struct TransferPayload {
    pub data: Bytes,
    pub encoding: PayloadEncoding,
    pub chunk: Option<ChunkInfo>,
}

impl TransferPayload {
    pub fn plain(data: Bytes) -> Self {
        Self {
            data,
            encoding: PayloadEncoding::Identity,
            chunk: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_message_tags_match_wire_contract() {
        let msg: PushMessage =
            serde_json::from_str(r#"{"type":"sync:changes","paths":["/notes/a.md"]}"#).unwrap();
        assert!(matches!(msg, PushMessage::Changes { ref paths } if paths.len() == 1));

        let ping = serde_json::to_string(&PushMessage::Ping).unwrap();
        assert_eq!(ping, r#"{"type":"ping"}"#);
    }

    #[test]
    fn conflict_message_flattens_fields() {
        let raw = r#"{
            "type": "sync:conflict",
            "path": "/notes/a.md",
            "kind": "content",
            "remote": {"timestamp": "2026-01-01T00:00:00Z", "size": 10, "hash": "h2"}
        }"#;
        let msg: PushMessage = serde_json::from_str(raw).unwrap();
        match msg {
            PushMessage::Conflict { conflict } => {
                assert_eq!(conflict.path, "/notes/a.md");
                assert_eq!(conflict.kind, ConflictKind::Content);
                assert!(conflict.local.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn check_response_defaults_missing_fields() {
        let resp: CheckResponse = serde_json::from_str(r#"{"files_to_upload":[]}"#).unwrap();
        assert!(resp.files_to_download.is_empty());
        assert!(resp.conflicts.is_empty());
    }
}
