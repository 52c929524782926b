//! Session store behavior against scripted collaborators.
//!
//! Every test runs on a paused Tokio clock, so watchdog and delayed replies
//! resolve instantly and deterministically.

use std::time::Duration;

use authframe_app::{
    AuthState, ConfigError, PASSWORD_RESET_MESSAGE, REGISTRATION_CONFIRMATION_MESSAGE, Screen,
    SessionConfig, SessionStore,
};
use authframe_client::{AuthChange, SignUpResponse};
use authframe_core::{AccessPolicy, AuthError, ProfileError, ProfileUpdate, UserId, UserLevel};
use authframe_harness::{
    Reply, ScriptedAuthClient, ScriptedProfileStore, SimEnv,
    fixtures::{NOW, profile, session_for, user},
};

type Store = SessionStore<ScriptedAuthClient, ScriptedProfileStore, SimEnv>;

struct Fixture {
    store: Store,
    auth: ScriptedAuthClient,
    profiles: ScriptedProfileStore,
    env: SimEnv,
}

fn fixture_with(config: SessionConfig) -> Fixture {
    let env = SimEnv::new();
    let auth = ScriptedAuthClient::new();
    let profiles = ScriptedProfileStore::new(&env);
    let store = SessionStore::new(auth.clone(), profiles.clone(), env.clone(), config)
        .expect("valid config");
    Fixture { store, auth, profiles, env }
}

fn fixture() -> Fixture {
    fixture_with(SessionConfig::default())
}

/// Wait until `loading` clears and return the published state.
async fn settled(store: &Store) -> AuthState {
    wait_until(store, |s| !s.loading).await
}

async fn wait_until(store: &Store, done: impl FnMut(&AuthState) -> bool) -> AuthState {
    let mut rx = store.watch();
    let state = rx.wait_for(done).await.expect("store dropped");
    state.clone()
}

/// Start with a valid persisted session and profile for `u1`.
async fn signed_in_fixture() -> Fixture {
    let f = fixture();
    f.auth.set_get_session(Reply::ok(Some(session_for("u1", NOW + 3600))));
    f.profiles.insert(profile("u1", UserLevel::Manager));
    f.store.start();

    let state = settled(&f.store).await;
    assert!(state.profile.is_some());
    f
}

#[tokio::test(start_paused = true)]
async fn no_persisted_session_starts_signed_out() {
    let f = fixture();
    assert_eq!(f.store.state().screen(), Screen::Loading);

    f.store.start();
    let state = settled(&f.store).await;

    assert_eq!(state, AuthState { user: None, profile: None, session: None, loading: false });
    assert_eq!(state.screen(), Screen::Auth);
    assert_eq!(f.auth.calls("get_session"), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_persisted_session_is_never_exposed() {
    for expires_at in [NOW - 3600, NOW - 1, NOW] {
        let f = fixture();
        f.auth.set_get_session(Reply::ok(Some(session_for("u1", expires_at))));
        f.store.start();

        let state = settled(&f.store).await;
        assert!(state.user.is_none(), "expires_at {expires_at} adopted");
        assert!(state.session.is_none());
        assert_eq!(f.auth.calls("refresh_session"), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn session_load_error_fails_closed() {
    let f = fixture();
    f.auth.set_get_session(Reply::err(AuthError::Network("offline".into())));
    f.store.start();

    let state = settled(&f.store).await;
    assert!(state.user.is_none());
    assert!(!state.loading);
}

#[tokio::test(start_paused = true)]
async fn valid_session_is_adopted_with_profile() {
    let f = signed_in_fixture().await;
    let state = f.store.state();

    assert_eq!(state.user, Some(user("u1")));
    assert_eq!(state.screen(), Screen::Main);
    assert_eq!(state.user_level(), Some(UserLevel::Manager));
    assert_eq!(f.auth.calls("refresh_session"), 0);
    assert_eq!(f.profiles.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn session_near_expiry_is_refreshed_once_before_use() {
    let f = fixture();
    f.auth.set_get_session(Reply::ok(Some(session_for("u1", NOW + 120))));
    f.auth.set_refresh_session(Reply::ok(session_for("u1", NOW + 3600)));
    f.store.start();

    let state = settled(&f.store).await;
    assert_eq!(f.auth.calls("refresh_session"), 1);
    assert_eq!(state.session.and_then(|s| s.expires_at), Some(NOW + 3600));
    assert_eq!(state.user, Some(user("u1")));
}

#[tokio::test(start_paused = true)]
async fn failed_startup_refresh_clears_everything() {
    let f = fixture();
    f.auth.set_get_session(Reply::ok(Some(session_for("u1", NOW + 120))));
    f.profiles.insert(profile("u1", UserLevel::Creator));
    f.store.start();

    let state = settled(&f.store).await;
    assert_eq!(f.auth.calls("refresh_session"), 1);
    assert_eq!(state, AuthState { user: None, profile: None, session: None, loading: false });
    assert_eq!(f.profiles.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn profile_failure_keeps_user_and_session() {
    for fail in [
        ProfileError::TableMissing { table: "profiles".into() },
        ProfileError::Backend("connection reset".into()),
    ] {
        let f = fixture();
        f.auth.set_get_session(Reply::ok(Some(session_for("u1", NOW + 3600))));
        f.profiles.fail_with(fail);
        f.store.start();

        let state = settled(&f.store).await;
        assert!(state.user.is_some());
        assert!(state.session.is_some());
        assert!(state.profile.is_none());
    }
}

#[tokio::test(start_paused = true)]
async fn missing_profile_row_keeps_user() {
    let f = fixture();
    f.auth.set_get_session(Reply::ok(Some(session_for("u1", NOW + 3600))));
    f.store.start();

    let state = settled(&f.store).await;
    assert!(state.user.is_some());
    assert!(state.profile.is_none());
    assert!(!f.store.has_role(UserLevel::Creator));
}

#[tokio::test(start_paused = true)]
async fn remote_events_wait_for_initialization() {
    let f = fixture();
    f.auth.set_get_session(Reply::Delayed(Duration::from_secs(5), Ok(None)));
    f.profiles.insert(profile("u2", UserLevel::Creator));
    f.store.start();

    f.auth.emit(AuthChange::signed_in(session_for("u2", NOW + 3600)));
    tokio::task::yield_now().await;
    assert!(f.store.state().user.is_none());

    let state = settled(&f.store).await;
    assert!(state.user.is_none());

    f.auth.emit(AuthChange::signed_in(session_for("u2", NOW + 3600)));
    let state = wait_until(&f.store, |s| s.profile.is_some()).await;
    assert_eq!(state.user, Some(user("u2")));
    assert!(!state.loading);
}

#[tokio::test(start_paused = true)]
async fn watchdog_releases_hanging_initialization() {
    let f = fixture();
    f.auth.set_get_session(Reply::Hang);
    let started = tokio::time::Instant::now();
    f.store.start();

    let state = settled(&f.store).await;
    let waited = started.elapsed();

    assert!(state.user.is_none());
    assert!(waited >= Duration::from_secs(10), "released after {waited:?}");
    assert!(waited < Duration::from_secs(11), "released after {waited:?}");

    // Abandoned initialization no longer blocks remote events
    f.auth.emit(AuthChange::signed_in(session_for("u1", NOW + 3600)));
    let state = wait_until(&f.store, |s| s.user.is_some() && !s.loading).await;
    assert_eq!(state.user, Some(user("u1")));
}

#[tokio::test(start_paused = true)]
async fn watchdog_timeout_is_configurable() {
    let config = SessionConfig { watchdog_timeout_secs: 3, ..SessionConfig::default() };
    let f = fixture_with(config);
    f.auth.set_get_session(Reply::Hang);
    let started = tokio::time::Instant::now();
    f.store.start();

    settled(&f.store).await;
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn late_session_after_watchdog_is_discarded() {
    let f = fixture();
    let late = Ok(Some(session_for("u1", NOW + 3600)));
    f.auth.set_get_session(Reply::Delayed(Duration::from_secs(15), late));
    f.store.start();

    let state = settled(&f.store).await;
    assert!(state.user.is_none());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(f.store.state().user.is_none());
}

#[tokio::test(start_paused = true)]
async fn sign_in_completes_through_signed_in_event() {
    let f = fixture();
    f.profiles.insert(profile("u1", UserLevel::Creator));
    f.auth.set_sign_in(Reply::ok(session_for("u1", NOW + 3600)));
    f.store.start();
    settled(&f.store).await;

    let outcome = f.store.sign_in("u1@example.com", "secret1").await;
    assert!(outcome.success);

    let state = wait_until(&f.store, |s| s.user.is_some() && !s.loading).await;
    assert_eq!(state.user_level(), Some(UserLevel::Creator));
    assert_eq!(state.screen(), Screen::Main);
    assert!(f.store.has_role(UserLevel::Creator));
    assert!(!f.store.has_role(UserLevel::Manager));
}

#[tokio::test(start_paused = true)]
async fn rejected_sign_in_releases_loading() {
    let f = fixture();
    f.store.start();
    settled(&f.store).await;

    let outcome = f.store.sign_in("u1@example.com", "wrong").await;

    assert!(!outcome.success);
    assert_eq!(outcome.error, Some(AuthError::InvalidCredentials));
    assert!(!f.store.state().loading);
    assert!(f.store.state().user.is_none());
}

#[tokio::test(start_paused = true)]
async fn sign_out_clears_state_even_when_offline() {
    let f = signed_in_fixture().await;
    f.auth.set_sign_out(Reply::err(AuthError::Network("network error".into())));

    let outcome = f.store.sign_out().await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_message().as_deref(), Some("network error"));
    assert_eq!(
        f.store.state(),
        AuthState { user: None, profile: None, session: None, loading: false }
    );
}

#[tokio::test(start_paused = true)]
async fn sign_out_success() {
    let f = signed_in_fixture().await;

    let outcome = f.store.sign_out().await;
    assert!(outcome.success);

    let state = settled(&f.store).await;
    assert!(state.user.is_none());
    assert_eq!(state.screen(), Screen::Auth);
}

#[tokio::test(start_paused = true)]
async fn profile_arriving_after_sign_out_is_discarded() {
    let f = fixture();
    f.profiles.insert(profile("u1", UserLevel::Creator));
    f.store.start();
    settled(&f.store).await;

    f.profiles.set_fetch_delay(Some(Duration::from_secs(2)));
    f.auth.emit(AuthChange::signed_in(session_for("u1", NOW + 3600)));
    while f.store.state().user.is_none() {
        tokio::task::yield_now().await;
    }

    f.store.sign_out().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let state = f.store.state();
    assert!(state.user.is_none());
    assert!(state.profile.is_none());
    assert!(!state.loading);
}

#[tokio::test(start_paused = true)]
async fn token_refresh_event_updates_session_in_place() {
    let f = signed_in_fixture().await;
    let fetches = f.profiles.fetch_count();

    f.auth.emit(AuthChange::token_refreshed(session_for("u1", NOW + 7200)));
    let state =
        wait_until(&f.store, |s| s.session.as_ref().and_then(|s| s.expires_at) == Some(NOW + 7200))
            .await;

    assert!(state.profile.is_some());
    assert_eq!(f.profiles.fetch_count(), fetches);
}

#[tokio::test(start_paused = true)]
async fn remote_sign_out_clears_state() {
    let f = signed_in_fixture().await;

    f.auth.emit(AuthChange::signed_out());
    let state = wait_until(&f.store, |s| s.user.is_none()).await;

    assert!(state.profile.is_none());
    assert!(!state.loading);
}

#[tokio::test(start_paused = true)]
async fn sign_up_requiring_confirmation() {
    let f = fixture();
    f.auth.set_sign_up(Reply::ok(SignUpResponse { user: user("u1"), session: None }));
    f.store.start();
    settled(&f.store).await;

    let outcome = f.store.sign_up("u1@example.com", "secret1").await;

    assert!(outcome.success);
    assert!(outcome.confirmation_required);
    assert_eq!(outcome.message.as_deref(), Some(REGISTRATION_CONFIRMATION_MESSAGE));
    assert!(f.store.state().user.is_none());
    assert_eq!(f.auth.calls("sign_up"), 1);
}

#[tokio::test(start_paused = true)]
async fn sign_up_with_session_signs_in() {
    let f = fixture();
    let session = session_for("u1", NOW + 3600);
    f.auth.set_sign_up(Reply::ok(SignUpResponse { user: user("u1"), session: Some(session) }));
    f.profiles.insert(profile("u1", UserLevel::Executive));
    f.store.start();
    settled(&f.store).await;

    let outcome = f.store.sign_up_as("u1@example.com", "secret1", UserLevel::Executive).await;
    assert!(outcome.success);
    assert!(!outcome.confirmation_required);
    assert_eq!(outcome.message.as_deref(), Some(REGISTRATION_CONFIRMATION_MESSAGE));

    let state = wait_until(&f.store, |s| s.profile.is_some()).await;
    assert_eq!(state.user_level(), Some(UserLevel::Executive));
}

#[tokio::test(start_paused = true)]
async fn reset_password_reports_message() {
    let f = fixture();
    f.store.start();
    settled(&f.store).await;

    let outcome = f.store.reset_password("u1@example.com").await;
    assert!(outcome.success);
    assert_eq!(outcome.message.as_deref(), Some(PASSWORD_RESET_MESSAGE));

    f.auth.set_reset_password(Reply::err(AuthError::Provider {
        status: 429,
        message: "rate limited".into(),
    }));
    let outcome = f.store.reset_password("u1@example.com").await;
    assert!(!outcome.success);
    assert!(f.store.state().user.is_none());
}

#[tokio::test(start_paused = true)]
async fn ensure_fresh_refreshes_inside_window() {
    let f = signed_in_fixture().await;
    f.auth.set_refresh_session(Reply::ok(session_for("u1", NOW + 7200)));

    f.store.ensure_fresh().await;
    assert_eq!(f.auth.calls("refresh_session"), 0);

    f.env.advance(Duration::from_secs(3400));
    f.store.ensure_fresh().await;

    let state = f.store.state();
    assert_eq!(f.auth.calls("refresh_session"), 1);
    assert_eq!(state.session.and_then(|s| s.expires_at), Some(NOW + 7200));
    assert!(state.profile.is_some());
}

#[tokio::test(start_paused = true)]
async fn ensure_fresh_keeps_session_on_transient_failure() {
    let f = signed_in_fixture().await;
    f.auth.set_refresh_session(Reply::err(AuthError::Network("timeout".into())));
    f.env.advance(Duration::from_secs(3400));

    f.store.ensure_fresh().await;
    assert!(f.store.state().session.is_some());

    f.auth.set_refresh_session(Reply::err(AuthError::Provider {
        status: 400,
        message: "invalid refresh token".into(),
    }));
    f.store.ensure_fresh().await;
    assert!(f.store.state().session.is_none());
}

#[tokio::test(start_paused = true)]
async fn ensure_fresh_clears_expired_session() {
    let f = signed_in_fixture().await;
    f.env.set(NOW + 3600);

    f.store.ensure_fresh().await;

    let state = f.store.state();
    assert!(state.user.is_none());
    assert!(!state.loading);
    assert_eq!(f.auth.calls("refresh_session"), 0);
}

#[tokio::test(start_paused = true)]
async fn reload_user_replaces_identity() {
    let f = signed_in_fixture().await;
    let mut verified = user("u1");
    verified.email = "renamed@example.com".into();
    f.auth.set_get_current_user(Reply::ok(Some(verified.clone())));

    let outcome = f.store.reload_user().await;

    assert!(outcome.success);
    assert_eq!(f.store.state().user, Some(verified));
}

#[tokio::test(start_paused = true)]
async fn reload_user_requires_session() {
    let f = fixture();
    f.store.start();
    settled(&f.store).await;

    let outcome = f.store.reload_user().await;
    assert_eq!(outcome.error, Some(AuthError::SessionMissing));
    assert_eq!(f.auth.calls("get_current_user"), 0);
}

#[tokio::test(start_paused = true)]
async fn update_profile_refreshes_cache() {
    let f = signed_in_fixture().await;
    f.env.advance(Duration::from_secs(60));

    let updated = f.store.update_profile(ProfileUpdate::display_name("Ada")).await.unwrap();

    assert_eq!(updated.display_name.as_deref(), Some("Ada"));
    assert_eq!(updated.updated_at_secs, NOW + 60);
    assert_eq!(f.store.state().profile, Some(updated.clone()));
    assert_eq!(f.profiles.row(&UserId::new("u1")), Some(updated));
}

#[tokio::test(start_paused = true)]
async fn update_profile_requires_sign_in() {
    let f = fixture();
    f.store.start();
    settled(&f.store).await;

    let result = f.store.update_profile(ProfileUpdate::display_name("Ada")).await;
    assert_eq!(result, Err(ProfileError::NotSignedIn));
}

#[tokio::test(start_paused = true)]
async fn admin_by_profile_or_allowlist() {
    let config = SessionConfig {
        access: AccessPolicy::with_admin_emails(["U1@Example.com"]),
        ..SessionConfig::default()
    };
    let f = fixture_with(config);
    f.auth.set_get_session(Reply::ok(Some(session_for("u1", NOW + 3600))));
    f.profiles.insert(profile("u1", UserLevel::Creator));
    f.store.start();
    settled(&f.store).await;

    assert!(f.store.is_admin());
    // The allowlist grants the admin check only
    assert!(!f.store.has_role(UserLevel::Manager));

    let f = fixture();
    f.auth.set_get_session(Reply::ok(Some(session_for("u2", NOW + 3600))));
    f.profiles.insert(profile("u2", UserLevel::Admin));
    f.store.start();
    settled(&f.store).await;
    assert!(f.store.is_admin());
}

#[tokio::test(start_paused = true)]
async fn dispose_stops_listening() {
    let f = signed_in_fixture().await;
    assert_eq!(f.auth.subscriber_count(), 1);

    f.store.dispose();
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(f.auth.subscriber_count(), 0);
    f.auth.emit(AuthChange::signed_out());
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(f.store.state().user.is_some());

    // Starting again after dispose is a no-op
    f.store.start();
    assert_eq!(f.auth.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_pending_watchdog() {
    let f = fixture();
    f.auth.set_get_session(Reply::Hang);
    f.store.start();

    f.store.dispose();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(f.store.state().loading);
}

#[tokio::test(start_paused = true)]
async fn restart_revalidates_session() {
    let f = signed_in_fixture().await;
    f.env.set(NOW + 3600);

    f.store.start();
    let state = settled(&f.store).await;

    assert!(state.user.is_none());
    assert_eq!(f.auth.calls("get_session"), 2);
    assert_eq!(f.auth.subscriber_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn start_during_initialization_joins_running_attempt() {
    let f = fixture();
    let persisted = Ok(Some(session_for("u1", NOW + 3600)));
    f.auth.set_get_session(Reply::Delayed(Duration::from_secs(1), persisted));
    f.profiles.insert(profile("u1", UserLevel::Creator));
    let started = tokio::time::Instant::now();

    f.store.start();
    tokio::task::yield_now().await;
    f.store.start();

    let state = settled(&f.store).await;
    let waited = started.elapsed();

    assert_eq!(state.user, Some(user("u1")));
    assert!(state.profile.is_some());
    assert!(waited < Duration::from_secs(10), "released after {waited:?}");
    assert_eq!(f.auth.calls("get_session"), 1);
}

#[tokio::test(start_paused = true)]
async fn operations_after_dispose_fail_without_provider_calls() {
    let f = signed_in_fixture().await;
    f.store.dispose();

    let outcome = f.store.sign_out().await;
    assert!(!outcome.success);
    assert_eq!(outcome.error, Some(AuthError::Disposed));
    assert_eq!(f.auth.calls("sign_out"), 0);

    let outcome = f.store.sign_in("u1@example.com", "secret1").await;
    assert_eq!(outcome.error, Some(AuthError::Disposed));
    assert_eq!(f.auth.calls("sign_in"), 0);

    let outcome = f.store.sign_up("u2@example.com", "secret1").await;
    assert_eq!(outcome.error, Some(AuthError::Disposed));
    assert_eq!(f.store.reload_user().await.error, Some(AuthError::Disposed));

    assert!(!f.store.state().loading);
}

#[test]
fn invalid_config_is_rejected() {
    let env = SimEnv::new();
    let profiles = ScriptedProfileStore::new(&env);
    let config = SessionConfig { watchdog_timeout_secs: 0, ..SessionConfig::default() };

    let result = SessionStore::new(ScriptedAuthClient::new(), profiles, env, config);
    assert_eq!(result.err(), Some(ConfigError::WatchdogDisabled));
}
