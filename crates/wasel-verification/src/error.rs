//! Verification error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// Input rejected before anything was sent
    #[error("{0}")]
    Validation(String),

    #[error("Unknown verification item: {0}")]
    UnknownItem(String),

    /// The item's status does not allow the operation
    #[error("Invalid verification state: {0}")]
    InvalidState(String),

    /// Transport failure while uploading; the item status is unchanged
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The document was refused; the item is now rejected
    #[error("Document rejected: {reason}")]
    DocumentRejected { reason: String },

    #[error("Network unavailable: {0}")]
    Network(String),

    /// The confirmation code or email could not be sent
    #[error("Could not send confirmation: {0}")]
    Confirmation(String),

    #[error("Upload cancelled")]
    Cancelled,
}

impl VerificationError {
    /// Retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VerificationError::Upload(_) | VerificationError::Network(_)
        )
    }
}

pub type VerificationResult<T> = Result<T, VerificationError>;
