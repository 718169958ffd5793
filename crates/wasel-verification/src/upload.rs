//! Document uploads.
//!
//! A document is split into a fixed number of chunks and pushed through a
//! [`DocumentUploader`]. The tracker spawns one task per upload and reports
//! progress to the caller through an [`UploadHandle`].

use crate::{VerificationError, VerificationKind, VerificationResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

/// Largest document accepted by default (10 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Chunks per upload by default; each one advances progress by 10%.
pub const DEFAULT_CHUNK_COUNT: usize = 10;

/// Delay per chunk used by [`SimulatedUploader`].
pub const SIMULATED_CHUNK_DELAY: Duration = Duration::from_millis(200);

/// A document selected by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Check the document can be submitted for `kind`.
    pub fn validate(&self, kind: VerificationKind, max_bytes: usize) -> VerificationResult<()> {
        if self.file_name.trim().is_empty() {
            return Err(VerificationError::Validation(
                "Document file name is required.".to_string(),
            ));
        }
        if self.is_empty() {
            return Err(VerificationError::Validation(format!(
                "{} is empty.",
                self.file_name
            )));
        }
        if self.len() > max_bytes {
            return Err(VerificationError::Validation(format!(
                "{} is {} bytes; the limit is {} bytes.",
                self.file_name,
                self.len(),
                max_bytes
            )));
        }
        let content_type = self.content_type.trim().to_ascii_lowercase();
        if !kind.accepted_content_types().contains(&content_type.as_str()) {
            return Err(VerificationError::Validation(format!(
                "{} documents cannot be of type {}.",
                kind.name(),
                self.content_type
            )));
        }
        Ok(())
    }

    /// Lowercase hex SHA-256 of the document bytes.
    pub fn checksum(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        digest.iter().map(|byte| format!("{:02x}", byte)).collect()
    }

    /// Byte range of chunk `index` out of `count`. Ranges cover the whole
    /// document and differ in length by at most one byte.
    pub fn chunk(&self, index: usize, count: usize) -> &[u8] {
        let len = self.bytes.len();
        let start = len * index / count;
        let end = len * (index + 1) / count;
        &self.bytes[start..end]
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Metadata shared by every call for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadContext {
    pub upload_id: String,
    pub kind: VerificationKind,
    pub file_name: String,
    pub content_type: String,
    pub total_bytes: usize,
    pub chunk_count: usize,
}

impl UploadContext {
    pub fn new(kind: VerificationKind, document: &Document, chunk_count: usize) -> Self {
        Self {
            upload_id: uuid::Uuid::new_v4().to_string(),
            kind,
            file_name: document.file_name.clone(),
            content_type: document.content_type.clone(),
            total_bytes: document.len(),
            chunk_count,
        }
    }
}

/// Destination for verification documents.
///
/// Transport failures should be reported as [`VerificationError::Upload`]
/// or [`VerificationError::Network`]. A document refused on receipt is
/// [`VerificationError::DocumentRejected`].
#[async_trait]
pub trait DocumentUploader: Send + Sync {
    async fn upload_chunk(
        &self,
        upload: &UploadContext,
        index: usize,
        chunk: &[u8],
    ) -> VerificationResult<()>;

    async fn finalize(&self, upload: &UploadContext, checksum: &str) -> VerificationResult<()>;
}

/// Uploader that only waits a fixed delay per chunk.
#[derive(Debug, Clone)]
pub struct SimulatedUploader {
    chunk_delay: Duration,
}

impl SimulatedUploader {
    pub fn new(chunk_delay: Duration) -> Self {
        Self { chunk_delay }
    }
}

impl Default for SimulatedUploader {
    fn default() -> Self {
        Self::new(SIMULATED_CHUNK_DELAY)
    }
}

#[async_trait]
impl DocumentUploader for SimulatedUploader {
    async fn upload_chunk(
        &self,
        upload: &UploadContext,
        index: usize,
        chunk: &[u8],
    ) -> VerificationResult<()> {
        tokio::time::sleep(self.chunk_delay).await;
        debug!(
            upload_id = %upload.upload_id,
            kind = %upload.kind,
            index,
            bytes = chunk.len(),
            "Simulated chunk upload"
        );
        Ok(())
    }

    async fn finalize(&self, upload: &UploadContext, checksum: &str) -> VerificationResult<()> {
        debug!(
            upload_id = %upload.upload_id,
            kind = %upload.kind,
            checksum,
            "Simulated upload finalized"
        );
        Ok(())
    }
}

/// Progress notifications for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// Percentage of chunks sent, from 0 to 100.
    Progress { kind: VerificationKind, percent: u8 },
    /// The document was accepted; the item is now pending review.
    Completed {
        kind: VerificationKind,
        checksum: String,
    },
    Failed {
        kind: VerificationKind,
        error: VerificationError,
    },
    Cancelled { kind: VerificationKind },
}

impl UploadEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadEvent::Progress { .. })
    }
}

/// Caller's side of a running upload.
///
/// Dropping the handle detaches from the upload without stopping it.
#[derive(Debug)]
pub struct UploadHandle {
    kind: VerificationKind,
    events: mpsc::Receiver<UploadEvent>,
    stop_tx: broadcast::Sender<()>,
    result_rx: oneshot::Receiver<VerificationResult<String>>,
}

impl UploadHandle {
    pub(crate) fn new(
        kind: VerificationKind,
        events: mpsc::Receiver<UploadEvent>,
        stop_tx: broadcast::Sender<()>,
        result_rx: oneshot::Receiver<VerificationResult<String>>,
    ) -> Self {
        Self {
            kind,
            events,
            stop_tx,
            result_rx,
        }
    }

    pub fn kind(&self) -> VerificationKind {
        self.kind
    }

    /// Next progress event, or `None` once the upload task has finished and
    /// every event was read.
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        self.events.recv().await
    }

    /// Ask the upload to stop. Takes effect before the next chunk.
    pub fn cancel(&self) {
        let _ = self.stop_tx.send(());
    }

    /// Wait for the upload to finish. Returns the document checksum.
    pub async fn wait(self) -> VerificationResult<String> {
        self.result_rx
            .await
            .unwrap_or(Err(VerificationError::Cancelled))
    }
}
