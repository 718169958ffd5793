//! The verification checklist.
//!
//! [`VerificationTracker`] owns a fixed set of items and drives each one
//! through its status machine. Phone and email are started by sending a
//! confirmation; document items by uploading a file on a background task.

use crate::confirm::ConfirmationChannel;
use crate::item::{items_from_profile, VerificationItem, VerificationKind};
use crate::status::{VerificationInput, VerificationState};
use crate::upload::{
    Document, DocumentUploader, UploadContext, UploadEvent, UploadHandle, DEFAULT_CHUNK_COUNT,
    DEFAULT_MAX_DOCUMENT_BYTES,
};
use crate::{VerificationError, VerificationResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wasel_schema::Profile;

/// Used when an uploader refuses a document without saying why.
pub const DEFAULT_REJECTION_REASON: &str = "Document was rejected.";

/// Tuning for uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Chunks per document; progress advances by `100 / chunk_count`.
    pub chunk_count: usize,
    pub max_concurrent_uploads: usize,
    pub max_document_bytes: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            chunk_count: DEFAULT_CHUNK_COUNT,
            max_concurrent_uploads: 2,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

/// Where phone and email confirmations are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contact {
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Contact {
    pub fn from_profile(profile: &Profile) -> Self {
        let non_empty = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        Self {
            phone: profile.phone.as_deref().and_then(non_empty),
            email: non_empty(&profile.email),
        }
    }
}

/// Outcome of an external review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject { reason: String },
}

impl ReviewDecision {
    pub fn reject(reason: impl Into<String>) -> Self {
        ReviewDecision::Reject {
            reason: reason.into(),
        }
    }
}

/// What [`VerificationTracker::start_verification`] set in motion.
#[derive(Debug)]
pub enum VerificationStart {
    /// A code or link was sent; the item is pending.
    ConfirmationSent,
    /// A document upload is running.
    Uploading(UploadHandle),
}

impl VerificationStart {
    pub fn into_upload(self) -> Option<UploadHandle> {
        match self {
            VerificationStart::Uploading(handle) => Some(handle),
            VerificationStart::ConfirmationSent => None,
        }
    }
}

struct Slot {
    item: VerificationItem,
    progress: u8,
    /// A confirmation or upload is in flight.
    busy: bool,
}

#[derive(Default)]
struct Checklist {
    slots: Vec<Slot>,
}

impl Checklist {
    fn slot(&self, kind: VerificationKind) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.item.kind == kind)
    }

    fn slot_mut(&mut self, kind: VerificationKind) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.item.kind == kind)
    }

    fn set_progress(&mut self, kind: VerificationKind, percent: u8) {
        if let Some(slot) = self.slot_mut(kind) {
            slot.progress = percent;
        }
    }
}

/// Marks an item busy until dropped.
struct Claim {
    checklist: Arc<Mutex<Checklist>>,
    kind: VerificationKind,
}

impl Drop for Claim {
    fn drop(&mut self) {
        if let Some(slot) = self.checklist.lock().slot_mut(self.kind) {
            slot.busy = false;
            slot.progress = 0;
        }
    }
}

/// Tracks the user's verification checklist.
pub struct VerificationTracker {
    checklist: Arc<Mutex<Checklist>>,
    uploader: Arc<dyn DocumentUploader>,
    channel: Arc<dyn ConfirmationChannel>,
    contact: Contact,
    config: TrackerConfig,
    permits: Arc<Semaphore>,
    shutdown_tx: broadcast::Sender<()>,
    uploads: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl VerificationTracker {
    /// Create a tracker over `items`. Later duplicates of a kind are dropped.
    pub fn new(
        items: Vec<VerificationItem>,
        uploader: Arc<dyn DocumentUploader>,
        channel: Arc<dyn ConfirmationChannel>,
    ) -> Self {
        let mut checklist = Checklist::default();
        for item in items {
            if checklist.slot(item.kind).is_some() {
                warn!(kind = %item.kind, "Ignoring duplicate verification item");
                continue;
            }
            checklist.slots.push(Slot {
                item,
                progress: 0,
                busy: false,
            });
        }

        let config = TrackerConfig::default();
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            checklist: Arc::new(Mutex::new(checklist)),
            uploader,
            channel,
            contact: Contact::default(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_uploads)),
            config,
            shutdown_tx,
            uploads: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Checklist for a signed-in user, with confirmations sent to the
    /// profile's phone and email.
    pub fn for_profile(
        profile: &Profile,
        uploader: Arc<dyn DocumentUploader>,
        channel: Arc<dyn ConfirmationChannel>,
    ) -> Self {
        Self::new(items_from_profile(profile), uploader, channel)
            .with_contact(Contact::from_profile(profile))
    }

    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        let config = TrackerConfig {
            chunk_count: config.chunk_count.clamp(1, 100),
            max_concurrent_uploads: config.max_concurrent_uploads.max(1),
            max_document_bytes: config.max_document_bytes,
        };
        self.permits = Arc::new(Semaphore::new(config.max_concurrent_uploads));
        self.config = config;
        self
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contact = contact;
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Snapshot of every item in checklist order.
    pub fn items(&self) -> Vec<VerificationItem> {
        self.checklist
            .lock()
            .slots
            .iter()
            .map(|slot| slot.item.clone())
            .collect()
    }

    pub fn item(&self, id: &str) -> Option<VerificationItem> {
        let kind = VerificationKind::from_id(id)?;
        self.checklist.lock().slot(kind).map(|slot| slot.item.clone())
    }

    /// Current upload percentage for an item; 0 when nothing is uploading.
    pub fn progress(&self, id: &str) -> VerificationResult<u8> {
        let kind = self.lookup(id)?;
        Ok(self
            .checklist
            .lock()
            .slot(kind)
            .map(|slot| slot.progress)
            .unwrap_or(0))
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        VerificationKind::from_id(id)
            .and_then(|kind| self.checklist.lock().slot(kind).map(|slot| slot.busy))
            .unwrap_or(false)
    }

    /// Fraction of items approved, in `[0, 1]`. An empty checklist is 0.
    pub fn completion_ratio(&self) -> f64 {
        let checklist = self.checklist.lock();
        if checklist.slots.is_empty() {
            return 0.0;
        }
        let approved = checklist
            .slots
            .iter()
            .filter(|slot| slot.item.state.is_approved())
            .count();
        approved as f64 / checklist.slots.len() as f64
    }

    /// Every required item is approved.
    pub fn is_fully_verified(&self) -> bool {
        self.checklist
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.item.required)
            .all(|slot| slot.item.state.is_approved())
    }

    /// Start (or retry) verification of an item.
    ///
    /// Only items that are `not_started` or `rejected` and have nothing in
    /// flight can be started; anything else is [`VerificationError::InvalidState`]
    /// and leaves the item untouched. Document kinds need a `document`.
    pub async fn start_verification(
        &self,
        id: &str,
        document: Option<Document>,
    ) -> VerificationResult<VerificationStart> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(VerificationError::Cancelled);
        }
        let kind = self.lookup(id)?;
        let claim = self.claim(kind)?;

        if kind.is_document() {
            let document = document.ok_or_else(|| {
                VerificationError::Validation(format!(
                    "A document is required for {}.",
                    kind.name()
                ))
            })?;
            document.validate(kind, self.config.max_document_bytes)?;
            let handle = self.spawn_upload(kind, document, claim)?;
            return Ok(VerificationStart::Uploading(handle));
        }

        if document.is_some() {
            debug!(kind = %kind, "Ignoring document for confirmation-based item");
        }
        self.send_confirmation(kind).await?;

        let state = {
            let mut checklist = self.checklist.lock();
            let slot = checklist
                .slot_mut(kind)
                .ok_or_else(|| VerificationError::UnknownItem(id.to_string()))?;
            slot.item.state = slot.item.state.apply(VerificationInput::Submit, None)?;
            slot.item.state.clone()
        };
        drop(claim);

        info!(kind = %kind, status = %state, "Verification confirmation sent");
        Ok(VerificationStart::ConfirmationSent)
    }

    /// Record the result of an external review of a pending item.
    pub fn record_review(
        &self,
        id: &str,
        decision: ReviewDecision,
    ) -> VerificationResult<VerificationState> {
        let kind = self.lookup(id)?;
        let (input, reason) = match &decision {
            ReviewDecision::Approve => (VerificationInput::Approve, None),
            ReviewDecision::Reject { reason } => (VerificationInput::Reject, Some(reason.as_str())),
        };

        let mut checklist = self.checklist.lock();
        let slot = checklist
            .slot_mut(kind)
            .ok_or_else(|| VerificationError::UnknownItem(id.to_string()))?;
        let next = slot.item.state.apply(input, reason)?;
        slot.item.state = next.clone();

        info!(kind = %kind, status = %next, "Verification reviewed");
        Ok(next)
    }

    /// Stop every in-flight upload and wait for the tasks to exit.
    ///
    /// Later calls to [`VerificationTracker::start_verification`] fail with
    /// [`VerificationError::Cancelled`].
    pub async fn shutdown(&self) {
        let uploads = {
            let mut uploads = self.uploads.lock();
            self.closed.store(true, Ordering::SeqCst);
            std::mem::take(&mut *uploads)
        };
        let _ = self.shutdown_tx.send(());

        for upload in uploads {
            if let Err(e) = upload.await {
                if e.is_panic() {
                    warn!(error = %e, "Upload task panicked");
                }
            }
        }
        debug!("Verification tracker shut down");
    }

    fn lookup(&self, id: &str) -> VerificationResult<VerificationKind> {
        VerificationKind::from_id(id)
            .filter(|kind| self.checklist.lock().slot(*kind).is_some())
            .ok_or_else(|| VerificationError::UnknownItem(id.to_string()))
    }

    fn claim(&self, kind: VerificationKind) -> VerificationResult<Claim> {
        let mut checklist = self.checklist.lock();
        let slot = checklist
            .slot_mut(kind)
            .ok_or_else(|| VerificationError::UnknownItem(kind.id().to_string()))?;
        if slot.busy {
            return Err(VerificationError::InvalidState(format!(
                "{} verification is already in progress",
                kind
            )));
        }
        if !slot.item.state.can_start() {
            return Err(VerificationError::InvalidState(format!(
                "{} verification is {}",
                kind, slot.item.state
            )));
        }
        slot.busy = true;
        slot.progress = 0;

        Ok(Claim {
            checklist: self.checklist.clone(),
            kind,
        })
    }

    async fn send_confirmation(&self, kind: VerificationKind) -> VerificationResult<()> {
        match kind {
            VerificationKind::Phone => {
                let phone = self.contact.phone.as_deref().ok_or_else(|| {
                    VerificationError::Validation("No phone number on file.".to_string())
                })?;
                self.channel.send_phone_code(phone).await
            }
            VerificationKind::Email => {
                let email = self.contact.email.as_deref().ok_or_else(|| {
                    VerificationError::Validation("No email address on file.".to_string())
                })?;
                self.channel.send_email_confirmation(email).await
            }
            _ => Err(VerificationError::InvalidState(format!(
                "{} is verified with a document",
                kind
            ))),
        }
    }

    fn spawn_upload(
        &self,
        kind: VerificationKind,
        document: Document,
        claim: Claim,
    ) -> VerificationResult<UploadHandle> {
        let chunk_count = self.config.chunk_count;
        let (events_tx, events_rx) = mpsc::channel(chunk_count + 2);
        let (stop_tx, stop_rx) = broadcast::channel(1);
        let (result_tx, result_rx) = oneshot::channel();
        let shutdown_rx = self.shutdown_tx.subscribe();

        let job = UploadJob {
            kind,
            context: UploadContext::new(kind, &document, chunk_count),
            document,
            uploader: self.uploader.clone(),
            checklist: self.checklist.clone(),
            permits: self.permits.clone(),
            events: events_tx,
            stop_rx,
            shutdown_rx,
        };

        let mut uploads = self.uploads.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(VerificationError::Cancelled);
        }
        uploads.retain(|upload| !upload.is_finished());

        info!(
            kind = %kind,
            upload_id = %job.context.upload_id,
            bytes = job.context.total_bytes,
            "Starting document upload"
        );
        uploads.push(tokio::spawn(job.run(claim, result_tx)));

        Ok(UploadHandle::new(kind, events_rx, stop_tx, result_rx))
    }
}

struct UploadJob {
    kind: VerificationKind,
    context: UploadContext,
    document: Document,
    uploader: Arc<dyn DocumentUploader>,
    checklist: Arc<Mutex<Checklist>>,
    permits: Arc<Semaphore>,
    events: mpsc::Sender<UploadEvent>,
    stop_rx: broadcast::Receiver<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl UploadJob {
    async fn run(mut self, claim: Claim, result_tx: oneshot::Sender<VerificationResult<String>>) {
        let outcome = self.transfer().await;
        let outcome = self.settle(outcome);
        drop(claim);

        let event = match &outcome {
            Ok(checksum) => {
                info!(kind = %self.kind, upload_id = %self.context.upload_id, "Document uploaded");
                UploadEvent::Completed {
                    kind: self.kind,
                    checksum: checksum.clone(),
                }
            }
            Err(VerificationError::Cancelled) => {
                info!(kind = %self.kind, upload_id = %self.context.upload_id, "Upload cancelled");
                UploadEvent::Cancelled { kind: self.kind }
            }
            Err(e) => {
                warn!(
                    kind = %self.kind,
                    upload_id = %self.context.upload_id,
                    error = %e,
                    "Document upload failed"
                );
                UploadEvent::Failed {
                    kind: self.kind,
                    error: e.clone(),
                }
            }
        };
        let _ = self.events.send(event).await;
        let _ = result_tx.send(outcome);
    }

    async fn transfer(&mut self) -> VerificationResult<String> {
        let _permit = tokio::select! {
            biased;
            _ = stop_requested(&mut self.stop_rx, &mut self.shutdown_rx) => {
                return Err(VerificationError::Cancelled);
            }
            permit = self.permits.clone().acquire_owned() => {
                permit.map_err(|_| VerificationError::Cancelled)?
            }
        };

        self.report(0).await;
        let chunk_count = self.context.chunk_count;
        for index in 0..chunk_count {
            let chunk = self.document.chunk(index, chunk_count);
            if !chunk.is_empty() {
                tokio::select! {
                    biased;
                    _ = stop_requested(&mut self.stop_rx, &mut self.shutdown_rx) => {
                        return Err(VerificationError::Cancelled);
                    }
                    result = self.uploader.upload_chunk(&self.context, index, chunk) => result?,
                }
            }
            let percent = ((index + 1) * 100 / chunk_count) as u8;
            self.report(percent).await;
        }

        let checksum = self.document.checksum();
        tokio::select! {
            biased;
            _ = stop_requested(&mut self.stop_rx, &mut self.shutdown_rx) => {
                return Err(VerificationError::Cancelled);
            }
            result = self.uploader.finalize(&self.context, &checksum) => result?,
        }
        Ok(checksum)
    }

    async fn report(&self, percent: u8) {
        self.checklist.lock().set_progress(self.kind, percent);
        let _ = self
            .events
            .send(UploadEvent::Progress {
                kind: self.kind,
                percent,
            })
            .await;
    }

    /// Apply the upload outcome to the item's status.
    fn settle(&self, outcome: VerificationResult<String>) -> VerificationResult<String> {
        let mut checklist = self.checklist.lock();
        let slot = checklist
            .slot_mut(self.kind)
            .ok_or_else(|| VerificationError::UnknownItem(self.kind.id().to_string()))?;

        match outcome {
            Ok(checksum) => {
                slot.item.state = slot.item.state.apply(VerificationInput::Submit, None)?;
                Ok(checksum)
            }
            Err(VerificationError::DocumentRejected { reason }) => {
                let reason = match reason.trim() {
                    "" => DEFAULT_REJECTION_REASON.to_string(),
                    trimmed => trimmed.to_string(),
                };
                slot.item.state = slot
                    .item
                    .state
                    .apply(VerificationInput::Submit, None)?
                    .apply(VerificationInput::Reject, Some(&reason))?;
                Err(VerificationError::DocumentRejected { reason })
            }
            Err(e) => Err(e),
        }
    }
}

/// Resolves once the upload was cancelled or the tracker is shutting down.
///
/// A dropped [`UploadHandle`] closes the stop channel; the upload then
/// keeps running until shutdown.
async fn stop_requested(
    stop_rx: &mut broadcast::Receiver<()>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) {
    tokio::select! {
        result = stop_rx.recv() => {
            if matches!(result, Err(broadcast::error::RecvError::Closed)) {
                let _ = shutdown_rx.recv().await;
            }
        }
        _ = shutdown_rx.recv() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::SimulatedConfirmationChannel;
    use crate::item::default_items;
    use crate::upload::SimulatedUploader;

    fn tracker(items: Vec<VerificationItem>) -> VerificationTracker {
        VerificationTracker::new(
            items,
            Arc::new(SimulatedUploader::default()),
            Arc::new(SimulatedConfirmationChannel::new()),
        )
    }

    #[test]
    fn test_completion_ratio_of_seed() {
        let tracker = tracker(default_items());
        assert!((tracker.completion_ratio() - 0.4).abs() < f64::EPSILON);
        assert!(!tracker.is_fully_verified());
    }

    #[test]
    fn test_completion_ratio_empty() {
        assert_eq!(tracker(Vec::new()).completion_ratio(), 0.0);
    }

    #[test]
    fn test_duplicate_items_are_dropped() {
        let mut items = default_items();
        items.push(VerificationItem::new(
            VerificationKind::Phone,
            true,
            VerificationState::NotStarted,
        ));
        let tracker = tracker(items);

        assert_eq!(tracker.items().len(), 5);
        assert_eq!(
            tracker.item("phone").unwrap().state,
            VerificationState::Approved
        );
    }

    #[test]
    fn test_record_review() {
        let tracker = tracker(default_items());

        let state = tracker
            .record_review("national_id", ReviewDecision::Approve)
            .unwrap();
        assert_eq!(state, VerificationState::Approved);
        assert!((tracker.completion_ratio() - 0.6).abs() < 1e-9);

        let err = tracker
            .record_review("drivers_license", ReviewDecision::Approve)
            .unwrap_err();
        assert!(matches!(err, VerificationError::InvalidState(_)));
        assert_eq!(
            tracker.item("drivers_license").unwrap().state,
            VerificationState::NotStarted
        );
    }

    #[test]
    fn test_unknown_item() {
        let tracker = tracker(default_items());
        assert!(matches!(
            tracker.progress("passport"),
            Err(VerificationError::UnknownItem(_))
        ));
        assert!(tracker.item("passport").is_none());
    }

    #[test]
    fn test_config_is_clamped() {
        let tracker = tracker(default_items()).with_config(TrackerConfig {
            chunk_count: 0,
            max_concurrent_uploads: 0,
            max_document_bytes: 1024,
        });
        assert_eq!(tracker.config().chunk_count, 1);
        assert_eq!(tracker.config().max_concurrent_uploads, 1);
    }

    #[test]
    fn test_contact_from_profile() {
        let profile = Profile::from_insert(
            &wasel_schema::NewProfile {
                id: "user-1".to_string(),
                email: "rider@example.com".to_string(),
                phone: Some("  ".to_string()),
                full_name: "Omar Saleh".to_string(),
                email_verified: false,
                phone_verified: false,
            },
            chrono::Utc::now(),
        );
        let contact = Contact::from_profile(&profile);
        assert_eq!(contact.phone, None);
        assert_eq!(contact.email.as_deref(), Some("rider@example.com"));
    }
}
