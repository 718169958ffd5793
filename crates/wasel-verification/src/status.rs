//! Per-item verification status machine.
//!
//! ```text
//! NotStarted ──Submit──► Pending ──Approve──► Approved
//!                         ▲   │
//!                  Submit │   │ Reject
//!                         │   ▼
//!                        Rejected
//! ```

use crate::{VerificationError, VerificationResult};
use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::fmt;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub verification_machine(NotStarted)

    NotStarted => {
        Submit => Pending
    },
    Pending => {
        Approve => Approved,
        Reject => Rejected
    },
    Rejected => {
        Submit => Pending
    }
}

pub use verification_machine::Input as VerificationInput;
pub use verification_machine::State as VerificationMachineState;
pub use verification_machine::StateMachine as VerificationMachine;

/// Status of one verification item.
///
/// The rejection reason lives inside `Rejected`, so it exists exactly when
/// the item is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationState {
    NotStarted,
    Pending,
    Approved,
    Rejected { reason: String },
}

impl VerificationState {
    pub fn rejected(reason: impl Into<String>) -> Self {
        VerificationState::Rejected {
            reason: reason.into(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationState::NotStarted => "not_started",
            VerificationState::Pending => "pending",
            VerificationState::Approved => "approved",
            VerificationState::Rejected { .. } => "rejected",
        }
    }

    /// The user may start (or retry) verification.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            VerificationState::NotStarted | VerificationState::Rejected { .. }
        )
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, VerificationState::Approved)
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            VerificationState::Rejected { reason } => Some(reason),
            _ => None,
        }
    }

    fn machine_state(&self) -> VerificationMachineState {
        match self {
            VerificationState::NotStarted => VerificationMachineState::NotStarted,
            VerificationState::Pending => VerificationMachineState::Pending,
            VerificationState::Approved => VerificationMachineState::Approved,
            VerificationState::Rejected { .. } => VerificationMachineState::Rejected,
        }
    }

    /// Apply `input`. `reason` is required for `Reject` and ignored otherwise.
    pub fn apply(
        &self,
        input: VerificationInput,
        reason: Option<&str>,
    ) -> VerificationResult<VerificationState> {
        let mut machine = VerificationMachine::from_state(self.machine_state());
        if machine.consume(&input).is_err() {
            return Err(VerificationError::InvalidState(format!(
                "cannot apply {:?} to an item that is {}",
                input,
                self.as_str()
            )));
        }

        Ok(match machine.state() {
            VerificationMachineState::NotStarted => VerificationState::NotStarted,
            VerificationMachineState::Pending => VerificationState::Pending,
            VerificationMachineState::Approved => VerificationState::Approved,
            VerificationMachineState::Rejected => {
                let reason = reason.map(str::trim).filter(|r| !r.is_empty()).ok_or_else(|| {
                    VerificationError::Validation("A rejection reason is required.".to_string())
                })?;
                VerificationState::rejected(reason)
            }
        })
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
