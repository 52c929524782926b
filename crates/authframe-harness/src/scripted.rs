//! Scripted backend collaborators.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use authframe_client::{
    AuthChange, AuthChangeFeed, AuthClient, AuthSubscription, ProfileStore, SignUpMetadata,
    SignUpResponse,
};
use authframe_core::{
    AuthError, Profile, ProfileError, ProfileUpdate, Session, User, UserId, env::Environment,
};

use crate::SimEnv;

/// Scripted answer to a backend call.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    /// Answer immediately.
    Ready(Result<T, AuthError>),
    /// Never answer.
    Hang,
    /// Answer after a delay on the Tokio clock.
    Delayed(Duration, Result<T, AuthError>),
}

impl<T> Reply<T> {
    /// Immediate success.
    pub fn ok(value: T) -> Self {
        Self::Ready(Ok(value))
    }

    /// Immediate failure.
    pub fn err(error: AuthError) -> Self {
        Self::Ready(Err(error))
    }

    async fn resolve(self) -> Result<T, AuthError> {
        match self {
            Self::Ready(result) => result,
            Self::Hang => std::future::pending().await,
            Self::Delayed(delay, result) => {
                tokio::time::sleep(delay).await;
                result
            },
        }
    }
}

struct AuthScript {
    sign_up: Reply<SignUpResponse>,
    sign_in: Reply<Session>,
    sign_out: Reply<()>,
    get_session: Reply<Option<Session>>,
    get_current_user: Reply<Option<User>>,
    refresh_session: Reply<Session>,
    reset_password: Reply<()>,
    calls: HashMap<&'static str, usize>,
}

impl Default for AuthScript {
    fn default() -> Self {
        Self {
            sign_up: Reply::err(AuthError::AlreadyRegistered),
            sign_in: Reply::err(AuthError::InvalidCredentials),
            sign_out: Reply::ok(()),
            get_session: Reply::ok(None),
            get_current_user: Reply::ok(None),
            refresh_session: Reply::err(AuthError::SessionMissing),
            reset_password: Reply::ok(()),
            calls: HashMap::new(),
        }
    }
}

/// Auth client whose every answer is set by the test.
///
/// Defaults: no persisted session, sign-in rejected, sign-out accepted,
/// refresh rejected. A successful sign-in pushes a signed-in change and a
/// successful sign-out pushes a signed-out change, as a hosted provider does.
/// Clones share the script and the feed.
#[derive(Clone, Default)]
pub struct ScriptedAuthClient {
    script: Arc<Mutex<AuthScript>>,
    feed: AuthChangeFeed,
}

impl ScriptedAuthClient {
    /// Client with the default script.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AuthScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a call and take its scripted reply.
    fn record<T: Clone>(
        &self,
        op: &'static str,
        pick: impl FnOnce(&AuthScript) -> &Reply<T>,
    ) -> Reply<T> {
        let mut script = self.lock();
        *script.calls.entry(op).or_default() += 1;
        pick(&script).clone()
    }

    /// Script `sign_up`.
    pub fn set_sign_up(&self, reply: Reply<SignUpResponse>) {
        self.lock().sign_up = reply;
    }

    /// Script `sign_in`.
    pub fn set_sign_in(&self, reply: Reply<Session>) {
        self.lock().sign_in = reply;
    }

    /// Script `sign_out`.
    pub fn set_sign_out(&self, reply: Reply<()>) {
        self.lock().sign_out = reply;
    }

    /// Script `get_session`.
    pub fn set_get_session(&self, reply: Reply<Option<Session>>) {
        self.lock().get_session = reply;
    }

    /// Script `get_current_user`.
    pub fn set_get_current_user(&self, reply: Reply<Option<User>>) {
        self.lock().get_current_user = reply;
    }

    /// Script `refresh_session`.
    pub fn set_refresh_session(&self, reply: Reply<Session>) {
        self.lock().refresh_session = reply;
    }

    /// Script `reset_password_for_email`.
    pub fn set_reset_password(&self, reply: Reply<()>) {
        self.lock().reset_password = reply;
    }

    /// Number of calls made to `op` (the trait method name).
    pub fn calls(&self, op: &str) -> usize {
        self.lock().calls.get(op).copied().unwrap_or(0)
    }

    /// Push a change to subscribers.
    pub fn emit(&self, change: AuthChange) {
        self.feed.emit(change);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }
}

#[async_trait]
impl AuthClient for ScriptedAuthClient {
    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        _metadata: SignUpMetadata,
    ) -> Result<SignUpResponse, AuthError> {
        let response = self.record("sign_up", |s| &s.sign_up).resolve().await?;
        if let Some(session) = &response.session {
            self.feed.emit(AuthChange::signed_in(session.clone()));
        }
        Ok(response)
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session, AuthError> {
        let session = self.record("sign_in", |s| &s.sign_in).resolve().await?;
        self.feed.emit(AuthChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.record("sign_out", |s| &s.sign_out).resolve().await?;
        self.feed.emit(AuthChange::signed_out());
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        self.record("get_session", |s| &s.get_session).resolve().await
    }

    async fn get_current_user(&self) -> Result<Option<User>, AuthError> {
        self.record("get_current_user", |s| &s.get_current_user).resolve().await
    }

    async fn refresh_session(&self) -> Result<Session, AuthError> {
        self.record("refresh_session", |s| &s.refresh_session).resolve().await
    }

    async fn reset_password_for_email(&self, _email: &str) -> Result<(), AuthError> {
        self.record("reset_password_for_email", |s| &s.reset_password).resolve().await
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.feed.subscribe()
    }
}

#[derive(Default)]
struct ProfileScript {
    rows: HashMap<UserId, Profile>,
    /// Every call fails with this while set
    failure: Option<ProfileError>,
    /// Delay applied to `get_by_id`
    fetch_delay: Option<Duration>,
    fetches: usize,
}

/// Profile table held in memory, with switchable failure modes.
///
/// Clones share the same rows.
#[derive(Clone)]
pub struct ScriptedProfileStore {
    env: SimEnv,
    script: Arc<Mutex<ProfileScript>>,
}

impl ScriptedProfileStore {
    /// Empty table stamping updates with `env`'s wall clock.
    pub fn new(env: &SimEnv) -> Self {
        Self { env: env.clone(), script: Arc::new(Mutex::new(ProfileScript::default())) }
    }

    fn lock(&self) -> MutexGuard<'_, ProfileScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_failure(&self) -> Result<(), ProfileError> {
        self.lock().failure.clone().map_or(Ok(()), Err)
    }

    /// Insert a row.
    #[must_use]
    pub fn with_profile(self, profile: Profile) -> Self {
        self.insert(profile);
        self
    }

    /// Insert or replace a row.
    pub fn insert(&self, profile: Profile) {
        self.lock().rows.insert(profile.id.clone(), profile);
    }

    /// Fail every call with `error` until [`Self::recover`].
    pub fn fail_with(&self, error: ProfileError) {
        self.lock().failure = Some(error);
    }

    /// Report the `profiles` table as missing.
    pub fn missing_table(&self) {
        self.fail_with(ProfileError::TableMissing { table: "profiles".to_string() });
    }

    /// Stop failing.
    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Delay profile fetches on the Tokio clock.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.lock().fetch_delay = delay;
    }

    /// Number of `get_by_id` calls.
    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }

    /// Current row for `id`.
    pub fn row(&self, id: &UserId) -> Option<Profile> {
        self.lock().rows.get(id).cloned()
    }
}

#[async_trait]
impl ProfileStore for ScriptedProfileStore {
    async fn get_by_id(&self, id: &UserId) -> Result<Option<Profile>, ProfileError> {
        let delay = {
            let mut script = self.lock();
            script.fetches += 1;
            script.fetch_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.check_failure()?;
        Ok(self.row(id))
    }

    async fn update(&self, id: &UserId, update: ProfileUpdate) -> Result<Profile, ProfileError> {
        self.check_failure()?;

        let now = self.env.wall_clock_secs();
        let mut script = self.lock();
        let row = script.rows.get_mut(id).ok_or_else(|| ProfileError::NotFound(id.clone()))?;
        update.apply(row, now);
        Ok(row.clone())
    }

    async fn delete(&self, id: &UserId) -> Result<(), ProfileError> {
        self.check_failure()?;
        self.lock().rows.remove(id);
        Ok(())
    }
}
