mod common;

use common::{wait_for, FakeBackend};
use std::sync::atomic::Ordering;
use wasel_auth::{AuthError, SessionEventKind, SessionState};
use wasel_schema::ProfileUpdate;

const EMAIL: &str = "layla@example.com";
const PASSWORD: &str = "correct-horse";

#[tokio::test]
async fn initialize_without_session_is_unauthenticated() {
    let fake = FakeBackend::new();
    let store = fake.store();
    assert!(store.is_loading());

    store.initialize().await.unwrap();

    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert!(!store.is_loading());
    assert!(store.is_backend_connected());
    assert!(store.user().is_none());
    assert_eq!(fake.subscriber_count(), 1);
}

#[tokio::test]
async fn initialize_restores_session_and_profile() {
    let fake = FakeBackend::new();
    let identity = fake.register(EMAIL, PASSWORD, "Layla Haddad");
    fake.set_current(Some(FakeBackend::session_for(&identity, "persisted")));

    let store = fake.store();
    store.initialize().await.unwrap();

    assert_eq!(store.state(), SessionState::Authenticated);
    assert_eq!(store.user().unwrap().id, identity.id);
    assert_eq!(store.profile().unwrap().full_name, "Layla Haddad");
}

#[tokio::test]
async fn sign_in_sets_session_and_profile() {
    let fake = FakeBackend::new();
    let identity = fake.register(EMAIL, PASSWORD, "Layla Haddad");
    let store = fake.store();
    store.initialize().await.unwrap();

    store.sign_in(EMAIL, PASSWORD).await.unwrap();

    assert_eq!(store.state(), SessionState::Authenticated);
    assert_eq!(store.session().unwrap().user.id, identity.id);
    assert_eq!(store.profile().unwrap().id, identity.id);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.user().unwrap().id, identity.id);
    assert!(snapshot.backend_connected);
}

#[tokio::test]
async fn sign_in_with_wrong_password_fails() {
    let fake = FakeBackend::new();
    fake.register(EMAIL, PASSWORD, "Layla Haddad");
    let store = fake.store();
    store.initialize().await.unwrap();

    let err = store.sign_in(EMAIL, "wrong-password").await.unwrap_err();

    assert!(matches!(err, AuthError::Auth { .. }));
    assert_eq!(err.user_message(), "Invalid email or password. Please try again.");
    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert!(store.session().is_none());
}

#[tokio::test]
async fn sign_in_with_unconfirmed_email_fails() {
    let fake = FakeBackend::new();
    fake.register_unconfirmed(EMAIL, PASSWORD);
    let store = fake.store();
    store.initialize().await.unwrap();

    let err = store.sign_in(EMAIL, PASSWORD).await.unwrap_err();

    assert_eq!(err.code(), Some("email_not_confirmed"));
    assert_eq!(
        err.user_message(),
        "Please verify your email address before logging in."
    );
    assert!(store.user().is_none());
}

#[tokio::test]
async fn failed_sign_in_keeps_existing_session() {
    let fake = FakeBackend::new();
    let identity = fake.register(EMAIL, PASSWORD, "Layla Haddad");
    let store = fake.store();
    store.initialize().await.unwrap();
    store.sign_in(EMAIL, PASSWORD).await.unwrap();

    assert!(store.sign_in("nobody@example.com", "whatever").await.is_err());

    assert_eq!(store.state(), SessionState::Authenticated);
    assert_eq!(store.user().unwrap().id, identity.id);
}

#[tokio::test]
async fn sign_up_creates_profile_without_touching_session() {
    let fake = FakeBackend::new();
    let store = fake.store();
    store.initialize().await.unwrap();

    let user = store
        .sign_up(EMAIL, PASSWORD, " Layla Haddad ", Some("+971501234567"))
        .await
        .unwrap();

    let row = fake.profile_row(&user.id).unwrap();
    assert_eq!(row.full_name, "Layla Haddad");
    assert_eq!(row.phone.as_deref(), Some("+971501234567"));
    assert!(!row.email_verified);
    assert!(!row.phone_verified);

    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert!(store.session().is_none());
    assert!(store.profile().is_none());
}

#[tokio::test]
async fn sign_up_with_registered_email_fails_and_leaves_state() {
    let fake = FakeBackend::new();
    let existing = fake.register(EMAIL, PASSWORD, "Layla Haddad");
    let store = fake.store();
    store.initialize().await.unwrap();
    store.sign_in(EMAIL, PASSWORD).await.unwrap();
    let before = store.snapshot();

    let err = store
        .sign_up(EMAIL, "another-pass", "Someone Else", None)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Auth { .. }));
    assert_eq!(err.code(), Some("user_already_exists"));
    assert_eq!(err.user_message(), "An account with this email already exists.");
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.user().unwrap().id, existing.id);
}

#[tokio::test]
async fn sign_up_rejects_short_password() {
    let fake = FakeBackend::new();
    let store = fake.store();

    let err = store
        .sign_up(EMAIL, "12345", "Layla Haddad", None)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Validation(_)));
    assert!(fake.profile_row("user-1").is_none());
}

#[tokio::test]
async fn sign_out_clears_everything() {
    let fake = FakeBackend::new();
    fake.register(EMAIL, PASSWORD, "Layla Haddad");
    let store = fake.store();
    store.initialize().await.unwrap();
    store.sign_in(EMAIL, PASSWORD).await.unwrap();

    store.sign_out().await;

    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert!(store.session().is_none());
    assert!(store.user().is_none());
    assert!(store.profile().is_none());
}

#[tokio::test]
async fn sign_out_clears_state_even_when_backend_fails() {
    let fake = FakeBackend::new();
    fake.register(EMAIL, PASSWORD, "Layla Haddad");
    fake.fail_sign_out.store(true, Ordering::SeqCst);
    let store = fake.store();
    store.initialize().await.unwrap();
    store.sign_in(EMAIL, PASSWORD).await.unwrap();

    store.sign_out().await;

    assert!(store.session().is_none());
    assert!(store.profile().is_none());
}

#[tokio::test]
async fn update_profile_requires_session() {
    let fake = FakeBackend::new();
    let store = fake.store();
    store.initialize().await.unwrap();

    let err = store
        .update_profile(ProfileUpdate::new().city("Dubai"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::NotAuthenticated));
    assert!(store.profile().is_none());
}

#[tokio::test]
async fn update_profile_writes_and_resyncs() {
    let fake = FakeBackend::new();
    let identity = fake.register(EMAIL, PASSWORD, "Layla Haddad");
    let store = fake.store();
    store.initialize().await.unwrap();
    store.sign_in(EMAIL, PASSWORD).await.unwrap();

    store
        .update_profile(ProfileUpdate::new().city("Dubai"))
        .await
        .unwrap();

    assert_eq!(store.profile().unwrap().city.as_deref(), Some("Dubai"));
    assert_eq!(
        fake.profile_row(&identity.id).unwrap().city.as_deref(),
        Some("Dubai")
    );
}

#[tokio::test]
async fn update_profile_rejects_blank_name() {
    let fake = FakeBackend::new();
    fake.register(EMAIL, PASSWORD, "Layla Haddad");
    let store = fake.store();
    store.initialize().await.unwrap();
    store.sign_in(EMAIL, PASSWORD).await.unwrap();

    let err = store
        .update_profile(ProfileUpdate::new().full_name("  "))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Validation(_)));
    assert_eq!(store.profile().unwrap().full_name, "Layla Haddad");
}

#[tokio::test]
async fn refresh_profile_failure_clears_profile() {
    let fake = FakeBackend::new();
    fake.register(EMAIL, PASSWORD, "Layla Haddad");
    let store = fake.store();
    store.initialize().await.unwrap();
    store.sign_in(EMAIL, PASSWORD).await.unwrap();
    assert!(store.profile().is_some());

    fake.fail_profile_fetch.store(true, Ordering::SeqCst);
    let err = store.refresh_profile().await.unwrap_err();

    assert!(matches!(err, AuthError::Backend { .. }));
    assert!(store.profile().is_none());
    assert!(store.session().is_some());
}

#[tokio::test]
async fn refresh_profile_without_session_is_noop() {
    let fake = FakeBackend::new();
    let store = fake.store();
    store.initialize().await.unwrap();

    store.refresh_profile().await.unwrap();
    assert_eq!(fake.profile_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn backend_events_replace_the_session() {
    let fake = FakeBackend::new();
    let first = fake.register(EMAIL, PASSWORD, "Layla Haddad");
    let second = fake.register("omar@example.com", PASSWORD, "Omar Saleh");
    let store = fake.store();
    store.initialize().await.unwrap();
    store.sign_in(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(store.user().unwrap().id, first.id);

    fake.emit(
        SessionEventKind::SignedIn,
        Some(FakeBackend::session_for(&second, "elsewhere")),
    );
    let snapshot = wait_for(&store, |s| {
        s.profile.as_ref().map(|p| p.id.as_str()) == Some(second.id.as_str())
    })
    .await;
    assert_eq!(snapshot.user().unwrap().id, second.id);
    assert_eq!(snapshot.state, SessionState::Authenticated);

    fake.emit(SessionEventKind::SignedOut, None);
    let snapshot = wait_for(&store, |s| s.session.is_none()).await;
    assert_eq!(snapshot.state, SessionState::Unauthenticated);
    assert!(snapshot.profile.is_none());
}

#[tokio::test]
async fn token_refresh_event_updates_tokens_for_same_user() {
    let fake = FakeBackend::new();
    let identity = fake.register(EMAIL, PASSWORD, "Layla Haddad");
    let store = fake.store();
    store.initialize().await.unwrap();
    store.sign_in(EMAIL, PASSWORD).await.unwrap();

    fake.emit(
        SessionEventKind::TokenRefreshed,
        Some(FakeBackend::session_for(&identity, "refreshed")),
    );
    let snapshot = wait_for(&store, |s| {
        s.session.as_ref().map(|s| s.access_token.as_str()) == Some("refreshed")
    })
    .await;
    assert_eq!(snapshot.user().unwrap().id, identity.id);
    assert_eq!(snapshot.state, SessionState::Authenticated);
}

#[tokio::test]
async fn profile_for_previous_user_is_discarded() {
    let fake = FakeBackend::new();
    fake.register(EMAIL, PASSWORD, "Layla Haddad");
    fake.publish_events.store(false, Ordering::SeqCst);
    fake.close_fetch_gate();
    let store = fake.store();
    store.initialize().await.unwrap();

    let signing_in = tokio::spawn({
        let store = store.clone();
        async move { store.sign_in(EMAIL, PASSWORD).await }
    });
    wait_for(&store, |s| s.state == SessionState::Authenticated).await;

    store.sign_out().await;
    fake.open_fetch_gate();
    signing_in.await.unwrap().unwrap();

    assert_eq!(store.state(), SessionState::Unauthenticated);
    assert!(store.session().is_none());
    assert!(store.profile().is_none());
}

#[tokio::test]
async fn user_stats_requires_session() {
    let fake = FakeBackend::new();
    fake.register(EMAIL, PASSWORD, "Layla Haddad");
    let store = fake.store();
    store.initialize().await.unwrap();

    assert!(matches!(
        store.user_stats().await,
        Err(AuthError::NotAuthenticated)
    ));

    store.sign_in(EMAIL, PASSWORD).await.unwrap();
    let stats = store.user_stats().await.unwrap();
    assert_eq!(stats.as_passenger, 3);
}

#[tokio::test]
async fn shutdown_unsubscribes_listener() {
    let fake = FakeBackend::new();
    let store = fake.store();
    store.initialize().await.unwrap();
    assert_eq!(fake.subscriber_count(), 1);

    store.shutdown().await;

    assert_eq!(fake.subscriber_count(), 0);
}

#[tokio::test]
async fn dropping_the_store_stops_the_listener() {
    let fake = FakeBackend::new();
    let store = fake.store();
    store.initialize().await.unwrap();

    drop(store);
    tokio::task::yield_now().await;

    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while fake.subscriber_count() > 0 {
        assert!(tokio::time::Instant::now() < deadline, "listener still running");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
