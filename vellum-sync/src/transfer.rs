//! Chunked, compressed, per-file retryable transfers
//!
//! Every file transfer is independently retryable and failure-isolated: a
//! file that still fails once its retries are exhausted is logged and
//! skipped, and the rest of the queue continues. The batch report says
//! which paths landed and which did not; the engine turns a dirty report
//! into a pass-level error without rolling back applied transfers.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use priority_queue::PriorityQueue;
use tracing::{debug, error, warn};
use vellum_index::ManifestEntry;
use vellum_transport::{ChunkInfo, Transport, TransferPayload};
use vellum_vfs::{Vfs, VfsError};

use crate::compress;
use crate::config::{ChunkingConfig, CompressionConfig, SyncConfig};
use crate::errors::{Result, SyncError};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Progress callback payload, one call per finished file.
#[derive(Debug, Clone)]
pub struct TransferTick {
    pub index: usize,
    pub total: usize,
    pub path: String,
    pub bytes_so_far: u64,
}

pub type ProgressFn<'a> = &'a (dyn Fn(TransferTick) + Send + Sync);

/// Outcome of one upload or download batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub bytes_transferred: u64,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct TransferExecutor {
    transport: Arc<dyn Transport>,
    vfs: Arc<dyn Vfs>,
    chunking: ChunkingConfig,
    compression: CompressionConfig,
    retry: RetryPolicy,
}

impl TransferExecutor {
    pub fn new(transport: Arc<dyn Transport>, vfs: Arc<dyn Vfs>, config: &SyncConfig) -> Self {
        Self {
            transport,
            vfs,
            chunking: config.chunking.clone(),
            compression: config.compression.clone(),
            retry: RetryPolicy::default(),
        }
    }

    /// Upload a set of paths, smallest files first so quick wins land while
    /// large transfers are still moving.
    pub async fn upload_files(&self, paths: Vec<String>, progress: ProgressFn<'_>) -> BatchReport {
        let mut queue = PriorityQueue::new();
        for path in paths {
            let size = match self.vfs.metadata(&path).await {
                Ok(info) => info.size,
                // Still queued; the failure surfaces during the transfer.
                Err(_) => u64::MAX,
            };
            queue.push(path, Reverse(size));
        }

        let total = queue.len();
        let mut report = BatchReport::default();
        let mut index = 0usize;

        while let Some((path, _)) = queue.pop() {
            index += 1;
            match self.upload_with_retry(&path).await {
                Ok(bytes) => {
                    report.bytes_transferred += bytes;
                    report.completed.push(path.clone());
                }
                Err(e) => {
                    error!("Upload failed for {}: {}", path, e);
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
            progress(TransferTick {
                index,
                total,
                path,
                bytes_so_far: report.bytes_transferred,
            });
        }

        report
    }

    /// Apply a set of remote entries locally: tombstones delete, everything
    /// else downloads and writes.
    pub async fn download_files(
        &self,
        entries: Vec<ManifestEntry>,
        progress: ProgressFn<'_>,
    ) -> BatchReport {
        let total = entries.len();
        let mut report = BatchReport::default();

        for (i, entry) in entries.into_iter().enumerate() {
            match self.apply_with_retry(&entry).await {
                Ok(bytes) => {
                    report.bytes_transferred += bytes;
                    report.completed.push(entry.path.clone());
                }
                Err(e) => {
                    error!("Download failed for {}: {}", entry.path, e);
                    report.failed.push((entry.path.clone(), e.to_string()));
                }
            }
            progress(TransferTick {
                index: i + 1,
                total,
                path: entry.path,
                bytes_so_far: report.bytes_transferred,
            });
        }

        report
    }

    /// Fetch remote content for one path and write it locally. Used by
    /// conflict resolution outside a normal pass.
    pub async fn apply_remote(&self, path: &str) -> Result<u64> {
        let payload = self.transport.download(path).await?;
        let data = compress::decode(&payload.data, payload.encoding)?;
        self.vfs.write(path, &data).await?;
        Ok(data.len() as u64)
    }

    async fn upload_with_retry(&self, path: &str) -> Result<u64> {
        let mut delay = self.retry.base_delay;
        let mut attempt = 0u32;
        loop {
            match self.upload_one(path).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts || !e.is_retryable() {
                        return Err(e);
                    }
                    warn!(
                        "Upload attempt {}/{} failed for {}: {}",
                        attempt, self.retry.max_attempts, path, e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    async fn apply_with_retry(&self, entry: &ManifestEntry) -> Result<u64> {
        let mut delay = self.retry.base_delay;
        let mut attempt = 0u32;
        loop {
            match self.apply_one(entry).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts || !e.is_retryable() {
                        return Err(e);
                    }
                    warn!(
                        "Download attempt {}/{} failed for {}: {}",
                        attempt, self.retry.max_attempts, entry.path, e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    async fn upload_one(&self, path: &str) -> Result<u64> {
        let data = self.vfs.read(path).await?;
        let (encoded, encoding) = compress::encode(&data, &self.compression)?;

        if self.chunking.enabled && encoded.len() as u64 >= self.chunking.threshold {
            let chunk_size = self.chunking.chunk_size.max(1);
            let count = encoded.len().div_ceil(chunk_size) as u32;
            debug!("Uploading {} in {} chunk(s)", path, count);

            for (i, piece) in encoded.chunks(chunk_size).enumerate() {
                self.transport
                    .upload(
                        path,
                        TransferPayload {
                            data: bytes::Bytes::copy_from_slice(piece),
                            encoding,
                            chunk: Some(ChunkInfo {
                                index: i as u32,
                                count,
                            }),
                        },
                    )
                    .await?;
            }
        } else {
            self.transport
                .upload(
                    path,
                    TransferPayload {
                        data: encoded.clone(),
                        encoding,
                        chunk: None,
                    },
                )
                .await?;
        }

        Ok(encoded.len() as u64)
    }

    async fn apply_one(&self, entry: &ManifestEntry) -> Result<u64> {
        if entry.deleted {
            match self.vfs.remove(&entry.path).await {
                Ok(()) | Err(VfsError::NotFound(_)) => return Ok(0),
                Err(e) => return Err(e.into()),
            }
        }

        let bytes = self.apply_remote(&entry.path).await.map_err(|e| {
            if e.is_retryable() {
                e
            } else {
                SyncError::Transfer {
                    path: entry.path.clone(),
                    reason: e.to_string(),
                }
            }
        })?;
        Ok(bytes)
    }
}
