//! Session state machine using rust-fsm.
//!
//! ```text
//!        ┌───────────┐
//!        │  Loading  │ (initial)
//!        └─────┬─────┘
//!              │ SessionFound / NoSession
//!              ▼
//! ┌─────────────────┐  SignInAttempt   ┌─────────────┐
//! │ Unauthenticated │ ───────────────► │  SigningIn  │
//! └─────────────────┘                  └──────┬──────┘
//!          ▲                                  │ SessionFound
//!          │ NoSession                        ▼
//! ┌─────────────────┐  SignOutRequested ┌───────────────┐
//! │   SigningOut    │ ◄──────────────── │ Authenticated │
//! └─────────────────┘                   └───────────────┘
//! ```
//!
//! `SessionFound` and `NoSession` come from the backend event stream and are
//! accepted in every state; the last one wins.

use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Loading)

    Loading => {
        SessionFound => Authenticated,
        NoSession => Unauthenticated,
        SignInAttempt => SigningIn
    },
    Unauthenticated => {
        SessionFound => Authenticated,
        NoSession => Unauthenticated,
        SignInAttempt => SigningIn
    },
    SigningIn => {
        SessionFound => Authenticated,
        NoSession => Unauthenticated
    },
    Authenticated => {
        SessionFound => Authenticated,
        NoSession => Unauthenticated,
        SignInAttempt => SigningIn,
        SignOutRequested => SigningOut
    },
    SigningOut => {
        SessionFound => Authenticated,
        NoSession => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Public view of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Bootstrap has not finished.
    Loading,
    Unauthenticated,
    SigningIn,
    Authenticated,
    SigningOut,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }

    /// An operation is in flight.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionState::Loading | SessionState::SigningIn | SessionState::SigningOut
        )
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Loading => SessionState::Loading,
            SessionMachineState::Unauthenticated => SessionState::Unauthenticated,
            SessionMachineState::SigningIn => SessionState::SigningIn,
            SessionMachineState::Authenticated => SessionState::Authenticated,
            SessionMachineState::SigningOut => SessionState::SigningOut,
        }
    }
}

/// Retry behavior for token refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Delay before retrying after the given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}
