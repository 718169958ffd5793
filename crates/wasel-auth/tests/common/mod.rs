#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use wasel_auth::{
    AuthError, AuthResult, Backend, Identity, ProfileRepository, Session, SessionEvent,
    SessionEventHub, SessionEventKind, SessionService, SessionStore, SessionSubscription,
    SignUpOutcome, SignUpRequest, StoreSnapshot,
};
use wasel_schema::{NewProfile, Profile, ProfileUpdate, UserStats};

struct Account {
    password: String,
    identity: Identity,
    confirmed: bool,
}

/// In-memory stand-in for the auth and data service.
pub struct FakeBackend {
    hub: SessionEventHub,
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<Session>>,
    profiles: Mutex<HashMap<String, Profile>>,
    next_id: AtomicUsize,
    /// Publish session events like the real service does.
    pub publish_events: AtomicBool,
    pub fail_profile_fetch: AtomicBool,
    pub fail_sign_out: AtomicBool,
    /// When set, profile fetches wait for a permit.
    fetch_gate: Mutex<Option<Arc<Semaphore>>>,
    pub profile_fetches: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            hub: SessionEventHub::default(),
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            profiles: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            publish_events: AtomicBool::new(true),
            fail_profile_fetch: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            fetch_gate: Mutex::new(None),
            profile_fetches: AtomicUsize::new(0),
        })
    }

    pub fn backend(self: &Arc<Self>) -> Backend {
        Backend::from_shared(self.clone())
    }

    pub fn store(self: &Arc<Self>) -> Arc<SessionStore> {
        SessionStore::new(Some(self.backend()))
    }

    /// Register a confirmed account with a profile row.
    pub fn register(&self, email: &str, password: &str, full_name: &str) -> Identity {
        let identity = self.create_account(email, password, true);
        let row = NewProfile {
            id: identity.id.clone(),
            email: email.to_string(),
            phone: None,
            full_name: full_name.to_string(),
            email_verified: true,
            phone_verified: false,
        };
        self.profiles
            .lock()
            .insert(identity.id.clone(), Profile::from_insert(&row, Utc::now()));
        identity
    }

    pub fn register_unconfirmed(&self, email: &str, password: &str) -> Identity {
        self.create_account(email, password, false)
    }

    fn create_account(&self, email: &str, password: &str, confirmed: bool) -> Identity {
        let id = format!("user-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut identity = Identity::new(id, Some(email.to_string()));
        if confirmed {
            identity.email_confirmed_at = Some(Utc::now());
        }
        self.accounts.lock().insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                identity: identity.clone(),
                confirmed,
            },
        );
        identity
    }

    pub fn session_for(identity: &Identity, token: &str) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: format!("{}-refresh", token),
            expires_at: Utc::now() + Duration::hours(1),
            user: identity.clone(),
        }
    }

    /// Pretend a session was persisted by an earlier run.
    pub fn set_current(&self, session: Option<Session>) {
        *self.current.lock() = session;
    }

    /// Push an event as if the service changed the session on its own.
    pub fn emit(&self, kind: SessionEventKind, session: Option<Session>) {
        *self.current.lock() = session.clone();
        self.hub.publish(SessionEvent::new(kind, session));
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    pub fn profile_row(&self, user_id: &str) -> Option<Profile> {
        self.profiles.lock().get(user_id).cloned()
    }

    /// Block profile fetches until [`FakeBackend::open_fetch_gate`].
    pub fn close_fetch_gate(&self) {
        *self.fetch_gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn open_fetch_gate(&self) {
        if let Some(gate) = self.fetch_gate.lock().as_ref() {
            gate.add_permits(1024);
        }
    }

    fn publish(&self, event: SessionEvent) {
        if self.publish_events.load(Ordering::SeqCst) {
            self.hub.publish(event);
        }
    }
}

#[async_trait]
impl SessionService for FakeBackend {
    async fn get_session(&self) -> AuthResult<Option<Session>> {
        Ok(self.current.lock().clone())
    }

    fn subscribe(&self) -> SessionSubscription {
        self.hub.subscribe()
    }

    async fn sign_up(&self, request: &SignUpRequest) -> AuthResult<SignUpOutcome> {
        if self.accounts.lock().contains_key(&request.email) {
            return Err(AuthError::auth(
                "User already registered",
                Some("user_already_exists"),
            ));
        }
        let mut identity = self.create_account(&request.email, &request.password, false);
        identity.user_metadata.full_name = Some(request.full_name.clone());
        identity.user_metadata.phone = request.phone.clone();
        Ok(SignUpOutcome {
            user: identity,
            session: None,
        })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        let identity = {
            let accounts = self.accounts.lock();
            let account = accounts
                .get(email)
                .filter(|account| account.password == password)
                .ok_or_else(|| {
                    AuthError::auth("Invalid login credentials", Some("invalid_credentials"))
                })?;
            if !account.confirmed {
                return Err(AuthError::auth(
                    "Email not confirmed",
                    Some("email_not_confirmed"),
                ));
            }
            account.identity.clone()
        };

        let token = format!("token-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let session = Self::session_for(&identity, &token);
        *self.current.lock() = Some(session.clone());
        self.publish(SessionEvent::new(
            SessionEventKind::SignedIn,
            Some(session.clone()),
        ));
        Ok(session)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.current.lock().take();
        self.publish(SessionEvent::signed_out());
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::Network("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for FakeBackend {
    async fn fetch(&self, _access_token: &str, user_id: &str) -> AuthResult<Option<Profile>> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);

        let gate = self.fetch_gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if self.fail_profile_fetch.load(Ordering::SeqCst) {
            return Err(AuthError::Backend {
                message: "permission denied for table profiles".to_string(),
                code: Some("42501".to_string()),
            });
        }
        Ok(self.profiles.lock().get(user_id).cloned())
    }

    async fn insert(&self, _access_token: Option<&str>, profile: &NewProfile) -> AuthResult<()> {
        self.profiles
            .lock()
            .insert(profile.id.clone(), Profile::from_insert(profile, Utc::now()));
        Ok(())
    }

    async fn update(
        &self,
        _access_token: &str,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> AuthResult<()> {
        let mut profiles = self.profiles.lock();
        let row = profiles.get_mut(user_id).ok_or_else(|| AuthError::Backend {
            message: "profile not found".to_string(),
            code: None,
        })?;
        update.apply_to(row, Utc::now());
        Ok(())
    }

    async fn user_stats(&self, _access_token: &str, _user_id: &str) -> AuthResult<UserStats> {
        Ok(UserStats {
            total_trips_count: 4,
            as_driver: 1,
            as_passenger: 3,
            total_distance_km: 212.0,
            carbon_saved_kg: 31.5,
        })
    }
}

/// Wait until the store publishes a snapshot matching `predicate`.
pub async fn wait_for<F>(store: &SessionStore, predicate: F) -> StoreSnapshot
where
    F: FnMut(&StoreSnapshot) -> bool,
{
    let mut rx: watch::Receiver<StoreSnapshot> = store.subscribe();
    let snapshot = tokio::time::timeout(std::time::Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for store state")
        .expect("store dropped");
    snapshot.clone()
}
