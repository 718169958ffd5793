//! Interfaces to the external auth and data service.

use crate::{AuthResult, Identity, Session, SessionSubscription};
use async_trait::async_trait;
use std::sync::Arc;
use wasel_schema::{NewProfile, Profile, ProfileUpdate, UserStats};

/// Account creation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

/// Result of a successful sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user: Identity,
    /// Present only when the service confirms accounts automatically.
    pub session: Option<Session>,
}

/// Authentication half of the backend.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// The current session, restored from persistence if necessary.
    async fn get_session(&self) -> AuthResult<Option<Session>>;

    /// Subscribe to session changes.
    fn subscribe(&self) -> SessionSubscription;

    async fn sign_up(&self, request: &SignUpRequest) -> AuthResult<SignUpOutcome>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session>;

    /// End the current session. Local state is cleared even when this errors.
    async fn sign_out(&self) -> AuthResult<()>;
}

/// Access to the `profiles` table and per-user aggregates.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn fetch(&self, access_token: &str, user_id: &str) -> AuthResult<Option<Profile>>;

    /// Insert a row. Without a token the request runs with the anonymous key.
    async fn insert(&self, access_token: Option<&str>, profile: &NewProfile) -> AuthResult<()>;

    async fn update(
        &self,
        access_token: &str,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> AuthResult<()>;

    async fn user_stats(&self, access_token: &str, user_id: &str) -> AuthResult<UserStats>;
}

/// The injected backend: one session service and one profile repository.
#[derive(Clone)]
pub struct Backend {
    pub sessions: Arc<dyn SessionService>,
    pub profiles: Arc<dyn ProfileRepository>,
}

impl Backend {
    pub fn new(sessions: Arc<dyn SessionService>, profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { sessions, profiles }
    }

    /// Use one object for both halves.
    pub fn from_shared<T>(backend: Arc<T>) -> Self
    where
        T: SessionService + ProfileRepository + 'static,
    {
        Self {
            sessions: backend.clone(),
            profiles: backend,
        }
    }
}
