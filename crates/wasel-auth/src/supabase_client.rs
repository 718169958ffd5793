//! Supabase auth and PostgREST client.
//!
//! Implements [`SessionService`] against `/auth/v1` and [`ProfileRepository`]
//! against `/rest/v1`. The current session is kept in memory and mirrored to
//! a [`SessionVault`], so a restart restores it and refreshes it if needed.

use crate::auth_fsm::RefreshConfig;
use crate::backend::{ProfileRepository, SessionService, SignUpOutcome, SignUpRequest};
use crate::{
    AuthError, AuthResult, Identity, Session, SessionEvent, SessionEventHub, SessionEventKind,
    SessionSubscription,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, info, warn};
use url::Url;
use wasel_core::Config;
use wasel_schema::{NearbyTrip, NearbyTripQuery, NewProfile, Profile, ProfileUpdate, UserStats};
use wasel_storage::{SessionMeta, SessionVault, StorageError, EXPIRY_MARGIN_SECS};

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Error payload shapes used by GoTrue and PostgREST.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Extract `(message, code)` from an error response body.
fn parse_error_body(body: &str, fallback: &str) -> (String, Option<String>) {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let code = parsed
        .error_code
        .clone()
        .or_else(|| match &parsed.code {
            Some(serde_json::Value::String(code)) => Some(code.clone()),
            _ => None,
        })
        .or_else(|| {
            parsed
                .error_description
                .as_ref()
                .and(parsed.error.clone())
        });

    let message = parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| fallback.to_string());

    (message, code)
}

/// Token grant response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: Identity,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in));

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Interpret a sign-up response.
///
/// With email confirmation enabled the service answers with the bare user;
/// an existing address comes back as a user without identities.
fn parse_signup_response(value: serde_json::Value, now: DateTime<Utc>) -> AuthResult<SignUpOutcome> {
    if value.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(value)?;
        let session = token.into_session(now);
        return Ok(SignUpOutcome {
            user: session.user.clone(),
            session: Some(session),
        });
    }

    let user_value = match value.get("user") {
        Some(user) if user.is_object() => user.clone(),
        _ => value,
    };

    let identities_empty = user_value
        .get("identities")
        .and_then(|ids| ids.as_array())
        .is_some_and(|ids| ids.is_empty());
    if identities_empty {
        return Err(AuthError::auth(
            "User already registered",
            Some("user_already_exists"),
        ));
    }

    let user: Identity = serde_json::from_value(user_value)?;
    Ok(SignUpOutcome {
        user,
        session: None,
    })
}

/// Supabase implementation of the backend traits.
pub struct SupabaseBackend {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
    redirect_url: Option<String>,
    vault: SessionVault,
    current: Mutex<Option<Session>>,
    hub: SessionEventHub,
    refresh_config: RefreshConfig,
}

impl SupabaseBackend {
    /// Create a client for the project at `api_url`
    /// (e.g. `https://xyz.supabase.co`).
    pub fn new(api_url: &Url, anon_key: impl Into<String>, vault: SessionVault) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.as_str().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            redirect_url: None,
            vault,
            current: Mutex::new(None),
            hub: SessionEventHub::default(),
            refresh_config: RefreshConfig::default(),
        }
    }

    /// Build from configuration. Fails when credentials are missing.
    pub fn from_config(config: &Config, vault: SessionVault) -> AuthResult<Self> {
        let api_url = config.supabase_url()?;
        let anon_key = config.publishable_key()?;
        Ok(Self::new(&api_url, anon_key, vault).with_redirect_url(config.email_redirect_url()))
    }

    pub fn with_redirect_url(mut self, redirect_url: impl Into<String>) -> Self {
        self.redirect_url = Some(redirect_url.into());
        self
    }

    pub fn with_refresh_config(mut self, refresh_config: RefreshConfig) -> Self {
        self.refresh_config = refresh_config;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, path)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, path)
    }

    /// Request with `apikey` and a bearer of either the user token or the anon key.
    fn request(&self, method: Method, url: &str, access_token: Option<&str>) -> RequestBuilder {
        let bearer = access_token.unwrap_or(&self.anon_key);
        self.http_client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Accept", "application/json")
    }

    async fn auth_error(response: Response, operation: &str) -> AuthError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let (message, code) = parse_error_body(&body, &format!("HTTP {}", status));
        warn!(
            operation,
            status = %status,
            code = code.as_deref().unwrap_or(""),
            body_summary = %summarize_response_body(&body),
            "Auth request rejected"
        );

        if status.is_server_error() {
            AuthError::Network(format!("HTTP {}: {}", status, message))
        } else {
            AuthError::Auth { message, code }
        }
    }

    async fn data_error(response: Response, operation: &str) -> AuthError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let (message, code) = parse_error_body(&body, &format!("HTTP {}", status));
        warn!(
            operation,
            status = %status,
            code = code.as_deref().unwrap_or(""),
            body_summary = %summarize_response_body(&body),
            "Data request rejected"
        );

        if status.is_server_error() {
            AuthError::Network(format!("HTTP {}: {}", status, message))
        } else {
            AuthError::Backend { message, code }
        }
    }

    /// Make `session` current and persist it.
    fn persist(&self, session: &Session) -> AuthResult<()> {
        let meta = SessionMeta {
            user_id: session.user.id.clone(),
            email: session.user.email.clone(),
            expires_at: session.expires_at.to_rfc3339(),
            user_json: Some(serde_json::to_string(&session.user)?),
        };
        self.vault
            .store(&session.access_token, &session.refresh_token, &meta)?;
        *self.current.lock() = Some(session.clone());
        Ok(())
    }

    fn clear_local(&self) {
        self.current.lock().take();
        self.vault.clear();
    }

    /// Load the persisted session, if complete.
    fn restore(&self) -> AuthResult<Option<Session>> {
        if !self.vault.has_session()? {
            return Ok(None);
        }

        let (Some(access_token), Some(refresh_token), Some(meta)) = (
            self.vault.access_token()?,
            self.vault.refresh_token()?,
            self.vault.meta()?,
        ) else {
            info!("Persisted session is incomplete, clearing it");
            self.vault.clear();
            return Ok(None);
        };

        let expires_at = DateTime::parse_from_rfc3339(&meta.expires_at)
            .map_err(|e| StorageError::Encoding(e.to_string()))?
            .with_timezone(&Utc);

        let user = match meta.user_json.as_deref() {
            Some(json) => serde_json::from_str(json)?,
            None => Identity::new(meta.user_id.clone(), meta.email.clone()),
        };

        debug!(user_id = %meta.user_id, "Restored persisted session");
        Ok(Some(Session {
            access_token,
            refresh_token,
            expires_at,
            user,
        }))
    }

    /// Refresh with exponential backoff. On final failure the session is
    /// cleared and `SignedOut` published.
    async fn refresh_with_backoff(&self, refresh_token: &str) -> AuthResult<Session> {
        let mut last_error = None;

        for attempt in 0..self.refresh_config.max_retries {
            match self.try_refresh(refresh_token).await {
                Ok(session) => {
                    self.persist(&session)?;
                    info!(user_id = %session.user.id, "Token refreshed");
                    self.hub.publish(SessionEvent::new(
                        SessionEventKind::TokenRefreshed,
                        Some(session.clone()),
                    ));
                    return Ok(session);
                }
                Err(e) if e.is_transient() => {
                    last_error = Some(e);
                    if attempt + 1 < self.refresh_config.max_retries {
                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries = self.refresh_config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Refresh failed with non-transient error");
                    self.clear_local();
                    self.hub.publish(SessionEvent::signed_out());
                    return Err(e);
                }
            }
        }

        warn!(
            attempts = self.refresh_config.max_retries,
            "Refresh retries exhausted"
        );
        self.clear_local();
        self.hub.publish(SessionEvent::signed_out());
        Err(last_error.unwrap_or_else(|| {
            AuthError::TokenRefresh(format!(
                "gave up after {} attempts",
                self.refresh_config.max_retries
            ))
        }))
    }

    async fn try_refresh(&self, refresh_token: &str) -> AuthResult<Session> {
        let url = self.auth_url("token?grant_type=refresh_token");
        let response = self
            .request(Method::POST, &url, None)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(match Self::auth_error(response, "refresh").await {
                AuthError::Auth { message, .. } => AuthError::TokenRefresh(message),
                other => other,
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.into_session(Utc::now()))
    }

    /// Call `search_nearby_trips`.
    pub async fn search_nearby_trips(
        &self,
        access_token: &str,
        query: &NearbyTripQuery,
    ) -> AuthResult<Vec<NearbyTrip>> {
        query
            .validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        let url = self.rest_url("rpc/search_nearby_trips");
        let response = self
            .request(Method::POST, &url, Some(access_token))
            .json(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::data_error(response, "search_nearby_trips").await);
        }

        let trips: Vec<NearbyTrip> = response.json().await?;
        debug!(count = trips.len(), "Nearby trips fetched");
        Ok(trips)
    }

    /// Send a one-time code to `phone` by SMS.
    pub async fn send_phone_otp(&self, phone: &str) -> AuthResult<()> {
        let url = self.auth_url("otp");
        let response = self
            .request(Method::POST, &url, None)
            .json(&serde_json::json!({ "phone": phone, "create_user": false }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::auth_error(response, "send_phone_otp").await);
        }
        info!("Phone verification code sent");
        Ok(())
    }

    /// Resend the sign-up confirmation email.
    pub async fn resend_email_confirmation(&self, email: &str) -> AuthResult<()> {
        let url = self.auth_url("resend");
        let mut body = serde_json::json!({ "type": "signup", "email": email });
        if let Some(redirect_url) = &self.redirect_url {
            body["options"] = serde_json::json!({ "email_redirect_to": redirect_url });
        }

        let response = self
            .request(Method::POST, &url, None)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::auth_error(response, "resend_email_confirmation").await);
        }
        info!("Confirmation email sent");
        Ok(())
    }
}

#[async_trait]
impl SessionService for SupabaseBackend {
    async fn get_session(&self) -> AuthResult<Option<Session>> {
        let cached = self.current.lock().clone();
        let session = match cached {
            Some(session) => session,
            None => match self.restore()? {
                Some(session) => session,
                None => return Ok(None),
            },
        };

        let margin = Duration::seconds(EXPIRY_MARGIN_SECS);
        if !session.is_expired_at(Utc::now() + margin) {
            *self.current.lock() = Some(session.clone());
            return Ok(Some(session));
        }

        info!(user_id = %session.user.id, "Session expired, attempting refresh");
        self.refresh_with_backoff(&session.refresh_token)
            .await
            .map(Some)
    }

    fn subscribe(&self) -> SessionSubscription {
        self.hub.subscribe()
    }

    async fn sign_up(&self, request: &SignUpRequest) -> AuthResult<SignUpOutcome> {
        let url = self.auth_url("signup");
        let mut builder = self.request(Method::POST, &url, None);
        if let Some(redirect_url) = &self.redirect_url {
            builder = builder.query(&[("redirect_to", redirect_url.as_str())]);
        }

        debug!(email = %request.email, "Signing up");
        let response = builder
            .json(&serde_json::json!({
                "email": request.email,
                "password": request.password,
                "data": {
                    "full_name": request.full_name,
                    "phone": request.phone,
                },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::auth_error(response, "sign_up").await);
        }

        let value: serde_json::Value = response.json().await?;
        let outcome = parse_signup_response(value, Utc::now())?;

        if let Some(session) = &outcome.session {
            self.persist(session)?;
            self.hub.publish(SessionEvent::new(
                SessionEventKind::SignedIn,
                Some(session.clone()),
            ));
        }

        info!(
            user_id = %outcome.user.id,
            confirmed = outcome.session.is_some(),
            "Account created"
        );
        Ok(outcome)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        let url = self.auth_url("token?grant_type=password");
        debug!(email = %email, "Attempting email/password sign-in");

        let response = self
            .request(Method::POST, &url, None)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::auth_error(response, "sign_in").await);
        }

        let token: TokenResponse = response.json().await?;
        let session = token.into_session(Utc::now());
        self.persist(&session)?;
        self.hub.publish(SessionEvent::new(
            SessionEventKind::SignedIn,
            Some(session.clone()),
        ));

        info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let cached = self.current.lock().as_ref().map(|s| s.access_token.clone());
        let access_token = match cached {
            Some(token) => Some(token),
            None => self.vault.access_token().ok().flatten(),
        };

        let result = match access_token {
            Some(token) => {
                let url = self.auth_url("logout");
                match self.request(Method::POST, &url, Some(&token)).send().await {
                    Ok(response) if response.status().is_success() => Ok(()),
                    Ok(response) => Err(Self::auth_error(response, "sign_out").await),
                    Err(e) => Err(AuthError::Http(e)),
                }
            }
            None => Ok(()),
        };

        self.clear_local();
        self.hub.publish(SessionEvent::signed_out());
        info!("Signed out");
        result
    }
}

#[async_trait]
impl ProfileRepository for SupabaseBackend {
    async fn fetch(&self, access_token: &str, user_id: &str) -> AuthResult<Option<Profile>> {
        let url = self.rest_url("profiles");
        let id_filter = format!("eq.{}", user_id);
        let response = self
            .request(Method::GET, &url, Some(access_token))
            .query(&[("id", id_filter.as_str()), ("select", "*"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::data_error(response, "fetch_profile").await);
        }

        let rows: Vec<Profile> = response.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, access_token: Option<&str>, profile: &NewProfile) -> AuthResult<()> {
        let url = self.rest_url("profiles");
        let response = self
            .request(Method::POST, &url, access_token)
            .header("Prefer", "return=minimal")
            .json(profile)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::data_error(response, "insert_profile").await);
        }

        debug!(user_id = %profile.id, "Profile row created");
        Ok(())
    }

    async fn update(
        &self,
        access_token: &str,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> AuthResult<()> {
        if update.is_empty() {
            return Ok(());
        }

        let url = self.rest_url("profiles");
        let response = self
            .request(Method::PATCH, &url, Some(access_token))
            .query(&[("id", format!("eq.{}", user_id))])
            .header("Prefer", "return=minimal")
            .json(update)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::data_error(response, "update_profile").await);
        }

        debug!(user_id = %user_id, "Profile row updated");
        Ok(())
    }

    async fn user_stats(&self, access_token: &str, user_id: &str) -> AuthResult<UserStats> {
        let url = self.rest_url("rpc/get_user_stats");
        let response = self
            .request(Method::POST, &url, Some(access_token))
            .json(&serde_json::json!({ "user_uuid": user_id }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::data_error(response, "get_user_stats").await);
        }

        let rows: Vec<UserStats> = response.json().await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }
}
