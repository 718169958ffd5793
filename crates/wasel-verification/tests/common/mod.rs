#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wasel_verification::{
    ConfirmationChannel, Document, DocumentUploader, SimulatedConfirmationChannel,
    SimulatedUploader, UploadContext, UploadEvent, UploadHandle, VerificationError,
    VerificationItem, VerificationKind, VerificationResult, VerificationState,
    VerificationTracker,
};

pub fn id_card() -> Document {
    Document::new("emirates-id.jpg", "image/jpeg", vec![42u8; 4096])
}

pub fn selfie() -> Document {
    Document::new("selfie.png", "image/png", vec![9u8; 1500])
}

pub fn item(kind: VerificationKind, state: VerificationState) -> VerificationItem {
    VerificationItem::new(kind, kind.is_required_by_default(), state)
}

/// Every kind, all not started.
pub fn fresh_items() -> Vec<VerificationItem> {
    VerificationKind::ALL
        .into_iter()
        .map(|kind| item(kind, VerificationState::NotStarted))
        .collect()
}

pub fn simulated_tracker(items: Vec<VerificationItem>) -> VerificationTracker {
    VerificationTracker::new(
        items,
        Arc::new(SimulatedUploader::default()),
        Arc::new(SimulatedConfirmationChannel::new()),
    )
}

/// Read events until the upload reports a terminal event.
pub async fn drain(handle: &mut UploadHandle) -> Vec<UploadEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(60), handle.next_event())
            .await
            .expect("timed out waiting for upload event");
        match event {
            Some(event) => {
                let terminal = event.is_terminal();
                events.push(event);
                if terminal {
                    return events;
                }
            }
            None => return events,
        }
    }
}

pub fn progress_values(events: &[UploadEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            UploadEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}

/// Uploader whose behavior is set per test.
pub struct ScriptedUploader {
    delay: Duration,
    /// Fail this chunk index with a transport error.
    pub fail_at: Mutex<Option<usize>>,
    /// Refuse the document at finalize time.
    pub reject_with: Mutex<Option<String>>,
    pub chunks: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub finalized: Mutex<Vec<(String, String)>>,
}

impl ScriptedUploader {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            fail_at: Mutex::new(None),
            reject_with: Mutex::new(None),
            chunks: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            finalized: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_at(&self, index: Option<usize>) {
        *self.fail_at.lock() = index;
    }

    pub fn reject_with(&self, reason: &str) {
        *self.reject_with.lock() = Some(reason.to_string());
    }
}

#[async_trait]
impl DocumentUploader for ScriptedUploader {
    async fn upload_chunk(
        &self,
        _upload: &UploadContext,
        index: usize,
        _chunk: &[u8],
    ) -> VerificationResult<()> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.chunks.fetch_add(1, Ordering::SeqCst);

        if *self.fail_at.lock() == Some(index) {
            return Err(VerificationError::Upload("connection reset by peer".to_string()));
        }
        Ok(())
    }

    async fn finalize(&self, upload: &UploadContext, checksum: &str) -> VerificationResult<()> {
        if let Some(reason) = self.reject_with.lock().clone() {
            return Err(VerificationError::DocumentRejected { reason });
        }
        self.finalized
            .lock()
            .push((upload.kind.id().to_string(), checksum.to_string()));
        Ok(())
    }
}

/// Channel that is always unreachable.
pub struct UnreachableChannel;

#[async_trait]
impl ConfirmationChannel for UnreachableChannel {
    async fn send_phone_code(&self, _phone: &str) -> VerificationResult<()> {
        Err(VerificationError::Network("sms gateway timeout".to_string()))
    }

    async fn send_email_confirmation(&self, _email: &str) -> VerificationResult<()> {
        Err(VerificationError::Network("smtp timeout".to_string()))
    }
}
