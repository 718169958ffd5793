//! The session/profile store.
//!
//! Owns the current session, the identity it carries and the cached
//! `profiles` row. State changes come from two directions: calls on the store
//! itself and the backend's session event stream. Both are applied the same
//! way, last write wins.

use crate::auth_fsm::{SessionMachine, SessionMachineInput, SessionState};
use crate::backend::{Backend, SignUpRequest};
use crate::supabase_client::SupabaseBackend;
use crate::validation::{validate_email, validate_full_name, validate_password, validate_phone};
use crate::{AuthError, AuthResult, Identity, Session, SessionEvent, SessionSubscription};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wasel_core::{Config, Paths};
use wasel_schema::{NewProfile, Profile, ProfileUpdate, UserStats};
use wasel_storage::{FileStorage, MemoryStorage, SessionStorage, SessionVault};

/// Point-in-time view of the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub state: SessionState,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub backend_connected: bool,
}

impl StoreSnapshot {
    pub fn user(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn is_loading(&self) -> bool {
        self.state == SessionState::Loading
    }
}

struct Inner {
    machine: SessionMachine,
    session: Option<Session>,
    profile: Option<Profile>,
}

impl Inner {
    fn state(&self) -> SessionState {
        SessionState::from(self.machine.state())
    }

    fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id())
    }
}

/// Session and profile state for the signed-in user.
///
/// Always used behind an `Arc`; the background listener holds a `Weak`.
pub struct SessionStore {
    backend: Option<Backend>,
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<StoreSnapshot>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    /// Create a store. `None` means no backend is configured; every
    /// backend operation then fails with [`AuthError::BackendUnavailable`].
    pub fn new(backend: Option<Backend>) -> Arc<Self> {
        let inner = Inner {
            machine: SessionMachine::new(),
            session: None,
            profile: None,
        };
        let (snapshot_tx, _) = watch::channel(StoreSnapshot {
            state: inner.state(),
            session: None,
            profile: None,
            backend_connected: backend.is_some(),
        });

        Arc::new(Self {
            backend,
            inner: Mutex::new(inner),
            snapshot_tx,
            listener: Mutex::new(None),
        })
    }

    /// Create a store backed by Supabase when both credentials are configured.
    pub fn from_config(config: &Config, storage: Box<dyn SessionStorage>) -> Arc<Self> {
        if !config.is_backend_configured() {
            info!("Supabase credentials not configured, running without a backend");
            return Self::new(None);
        }

        match SupabaseBackend::from_config(config, SessionVault::new(storage)) {
            Ok(client) => {
                info!(api_url = %client.api_url(), "Supabase backend configured");
                Self::new(Some(Backend::from_shared(Arc::new(client))))
            }
            Err(e) => {
                warn!(error = %e, "Invalid Supabase configuration, running without a backend");
                Self::new(None)
            }
        }
    }

    /// Session storage selected by `persist_session`.
    pub fn session_storage(config: &Config, paths: &Paths) -> Box<dyn SessionStorage> {
        if config.persist_session {
            Box::new(FileStorage::new(paths.session_file()))
        } else {
            Box::new(MemoryStorage::new())
        }
    }

    /// Restore the current session and start following backend events.
    pub async fn initialize(self: &Arc<Self>) -> AuthResult<()> {
        let Some(backend) = self.backend.clone() else {
            self.apply_session(None);
            return Ok(());
        };

        // Subscribe before reading so no change is missed in between.
        let subscription = backend.sessions.subscribe();
        let session = match backend.sessions.get_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Could not restore session");
                None
            }
        };

        self.apply_session(session.clone());
        self.spawn_listener(subscription);

        if let Some(session) = session {
            if let Err(e) = self.load_profile(&session).await {
                warn!(error = %e, "Error fetching profile");
            }
        }

        info!(state = ?self.state(), "Session store initialized");
        Ok(())
    }

    /// Create an account and its profile row.
    ///
    /// The local session is left alone: the new account normally has to
    /// confirm its email first. A session returned anyway arrives through
    /// the event stream.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        phone: Option<&str>,
    ) -> AuthResult<Identity> {
        validate_email(email)?;
        validate_password(password)?;
        validate_full_name(full_name)?;
        validate_phone(phone)?;
        let backend = self.backend.as_ref().ok_or(AuthError::BackendUnavailable)?;

        let request = SignUpRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
            full_name: full_name.trim().to_string(),
            phone: phone
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        };

        let outcome = backend.sessions.sign_up(&request).await?;

        let row = NewProfile {
            id: outcome.user.id.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            full_name: request.full_name.clone(),
            email_verified: false,
            phone_verified: false,
        };
        let token = outcome.session.as_ref().map(|s| s.access_token.as_str());
        if let Err(e) = backend.profiles.insert(token, &row).await {
            warn!(user_id = %row.id, error = %e, "Error creating profile");
            return Err(e);
        }

        info!(user_id = %outcome.user.id, "Signed up");
        Ok(outcome.user)
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<()> {
        validate_email(email)?;
        if password.is_empty() {
            return Err(AuthError::Validation("Password is required.".to_string()));
        }
        let backend = self.backend.as_ref().ok_or(AuthError::BackendUnavailable)?;

        self.transition(&SessionMachineInput::SignInAttempt)?;

        match backend
            .sessions
            .sign_in_with_password(email.trim(), password)
            .await
        {
            Ok(session) => {
                self.apply_session(Some(session.clone()));
                if let Err(e) = self.load_profile(&session).await {
                    warn!(error = %e, "Error fetching profile");
                }
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "Sign-in failed");
                self.settle();
                Err(e)
            }
        }
    }

    /// Sign out. Local state is always cleared; backend errors are logged.
    pub async fn sign_out(&self) {
        let _ = self.transition(&SessionMachineInput::SignOutRequested);

        if let Some(backend) = &self.backend {
            if let Err(e) = backend.sessions.sign_out().await {
                warn!(error = %e, "Sign out error");
            }
        }

        self.apply_session(None);
    }

    /// Apply a partial update to the current user's profile, then re-fetch it.
    pub async fn update_profile(&self, update: ProfileUpdate) -> AuthResult<()> {
        let session = self.session().ok_or(AuthError::NotAuthenticated)?;
        let backend = self.backend.as_ref().ok_or(AuthError::BackendUnavailable)?;

        if let Some(name) = &update.full_name {
            validate_full_name(name)?;
        }

        backend
            .profiles
            .update(&session.access_token, session.user_id(), &update)
            .await?;

        if let Err(e) = self.load_profile(&session).await {
            warn!(error = %e, "Error fetching profile after update");
        }
        Ok(())
    }

    /// Re-fetch the profile. No-op without a session.
    pub async fn refresh_profile(&self) -> AuthResult<()> {
        match self.session() {
            Some(session) => self.load_profile(&session).await,
            None => Ok(()),
        }
    }

    /// Trip statistics for the current user.
    pub async fn user_stats(&self) -> AuthResult<UserStats> {
        let session = self.session().ok_or(AuthError::NotAuthenticated)?;
        let backend = self.backend.as_ref().ok_or(AuthError::BackendUnavailable)?;
        backend
            .profiles
            .user_stats(&session.access_token, session.user_id())
            .await
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.lock().session.clone()
    }

    pub fn user(&self) -> Option<Identity> {
        self.inner.lock().session.as_ref().map(|s| s.user.clone())
    }

    pub fn profile(&self) -> Option<Profile> {
        self.inner.lock().profile.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state() == SessionState::Loading
    }

    pub fn is_backend_connected(&self) -> bool {
        self.backend.is_some()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Watch every state change.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Stop following backend events. Returns once the listener is gone.
    pub async fn shutdown(&self) {
        let handle = self.listener.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            debug!("Session listener stopped");
        }
    }

    fn spawn_listener(self: &Arc<Self>, mut subscription: SessionSubscription) {
        let store: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.handle_event(event).await;
            }
        });

        if let Some(previous) = self.listener.lock().replace(handle) {
            previous.abort();
        }
    }

    async fn handle_event(&self, event: SessionEvent) {
        info!(kind = ?event.kind, "Session changed");
        self.apply_session(event.session.clone());

        if let Some(session) = event.session {
            if let Err(e) = self.load_profile(&session).await {
                warn!(error = %e, "Error fetching profile");
            }
        }
    }

    /// Replace the session and identity. The profile is kept only while the
    /// user stays the same.
    fn apply_session(&self, session: Option<Session>) {
        let mut inner = self.inner.lock();
        let same_user = inner.user_id() == session.as_ref().map(|s| s.user_id());
        if !same_user {
            inner.profile = None;
        }

        let input = if session.is_some() {
            SessionMachineInput::SessionFound
        } else {
            SessionMachineInput::NoSession
        };
        inner.session = session;
        self.consume(&mut inner, &input);
    }

    /// Return to the state implied by the current session.
    fn settle(&self) {
        let mut inner = self.inner.lock();
        let input = if inner.session.is_some() {
            SessionMachineInput::SessionFound
        } else {
            SessionMachineInput::NoSession
        };
        self.consume(&mut inner, &input);
    }

    fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionState> {
        let mut inner = self.inner.lock();
        if inner.machine.consume(input).is_err() {
            return Err(AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                inner.state()
            )));
        }
        let state = inner.state();
        debug!(new_state = ?state, input = ?input, "Session state transition");
        self.publish(&inner);
        Ok(state)
    }

    /// Consume an input that every state accepts.
    fn consume(&self, inner: &mut Inner, input: &SessionMachineInput) {
        let old_state = inner.state();
        if inner.machine.consume(input).is_err() {
            warn!(state = ?old_state, input = ?input, "Session event rejected by state machine");
        }
        let new_state = inner.state();
        if old_state != new_state {
            debug!(old_state = ?old_state, new_state = ?new_state, "Session state transition");
        }
        self.publish(inner);
    }

    fn publish(&self, inner: &Inner) {
        self.snapshot_tx.send_replace(StoreSnapshot {
            state: inner.state(),
            session: inner.session.clone(),
            profile: inner.profile.clone(),
            backend_connected: self.backend.is_some(),
        });
    }

    /// Fetch the profile for `session` and cache it, unless the user changed
    /// in the meantime. A failed fetch clears the cached profile.
    async fn load_profile(&self, session: &Session) -> AuthResult<()> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };

        let result = backend
            .profiles
            .fetch(&session.access_token, session.user_id())
            .await;

        let mut inner = self.inner.lock();
        if inner.user_id() != Some(session.user_id()) {
            debug!(user_id = %session.user_id(), "Discarding profile for a user no longer signed in");
            return Ok(());
        }

        match result {
            Ok(profile) => {
                inner.profile = profile;
                self.publish(&inner);
                Ok(())
            }
            Err(e) => {
                inner.profile = None;
                self.publish(&inner);
                Err(e)
            }
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}
