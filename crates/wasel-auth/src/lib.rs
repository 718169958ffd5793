//! Authentication and profile state for the Wasel client.
//!
//! This crate provides:
//! - [`SessionStore`]: the current session, identity and cached profile,
//!   kept in sync with the backend's session events
//! - the backend seams [`SessionService`] and [`ProfileRepository`]
//! - [`SupabaseBackend`], the Supabase implementation with persisted,
//!   auto-refreshing sessions
//! - an explicit session state machine (rust-fsm)

mod auth_fsm;
mod backend;
mod error;
mod events;
mod identity;
mod store;
mod supabase_client;
pub mod validation;

pub use auth_fsm::session_machine;
pub use auth_fsm::{
    RefreshConfig, SessionMachine, SessionMachineInput, SessionMachineState, SessionState,
};
pub use backend::{Backend, ProfileRepository, SessionService, SignUpOutcome, SignUpRequest};
pub use error::{AuthError, AuthResult};
pub use events::{SessionEvent, SessionEventHub, SessionEventKind, SessionSubscription};
pub use identity::{Identity, Session, UserMetadata};
pub use store::{SessionStore, StoreSnapshot};
pub use supabase_client::SupabaseBackend;
