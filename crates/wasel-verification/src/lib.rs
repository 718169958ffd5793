//! Identity verification for the Wasel client.
//!
//! A [`VerificationTracker`] holds the user's checklist (phone, email,
//! national ID, driver's license, selfie). Each item moves through
//! `not_started → pending → approved | rejected` independently. Phone and
//! email are started by sending a confirmation over a
//! [`ConfirmationChannel`]; documents are uploaded in chunks through a
//! [`DocumentUploader`] on a cancellable background task.

mod confirm;
mod error;
mod item;
mod status;
mod tracker;
mod upload;

pub use confirm::{ConfirmationChannel, SimulatedConfirmationChannel, SupabaseConfirmationChannel};
pub use error::{VerificationError, VerificationResult};
pub use item::{
    default_items, items_from_profile, VerificationItem, VerificationKind, SEED_SELFIE_REJECTION,
};
pub use status::verification_machine;
pub use status::{VerificationInput, VerificationMachine, VerificationMachineState, VerificationState};
pub use tracker::{
    Contact, ReviewDecision, TrackerConfig, VerificationStart, VerificationTracker,
    DEFAULT_REJECTION_REASON,
};
pub use upload::{
    Document, DocumentUploader, SimulatedUploader, UploadContext, UploadEvent, UploadHandle,
    DEFAULT_CHUNK_COUNT, DEFAULT_MAX_DOCUMENT_BYTES, SIMULATED_CHUNK_DELAY,
};
