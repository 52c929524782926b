//! In-process backend for tests, demos and offline development.
//!
//! [`MemoryBackend`] implements both [`AuthClient`] and [`ProfileStore`] over
//! shared in-memory tables, mirroring the observable behavior of a hosted
//! backend: sessions expire after a TTL, sign-up can require email
//! confirmation, the `profiles` table can be missing, and every sign-in,
//! sign-out and refresh is pushed to subscribers as an [`AuthChange`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use authframe_core::{
    AuthError, Profile, ProfileError, ProfileUpdate, Session, User, UserId, env::Environment,
};

use crate::{
    AuthChange, AuthChangeFeed, AuthClient, AuthSubscription, ProfileStore, SignUpMetadata,
    SignUpResponse,
};

const PROFILES_TABLE: &str = "profiles";

/// Behavior knobs for [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBackendConfig {
    /// Lifetime of issued sessions.
    pub session_ttl: Duration,
    /// Withhold the session at sign-up until the email is confirmed.
    pub require_email_confirmation: bool,
    /// Shortest accepted password.
    pub min_password_length: usize,
    /// Whether the `profiles` table exists.
    pub profiles_table: bool,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(3600),
            require_email_confirmation: false,
            min_password_length: 6,
            profiles_table: true,
        }
    }
}

struct Account {
    user: User,
    password: String,
}

struct Inner {
    /// Accounts keyed by lowercase email
    accounts: HashMap<String, Account>,
    /// Persisted session, as a client would keep it in device storage
    current: Option<Session>,
    /// `None` models a missing table
    profiles: Option<HashMap<UserId, Profile>>,
    /// Emails that requested a password reset, in order
    reset_requests: Vec<String>,
    next_user: u64,
    next_token: u64,
}

/// In-memory authentication provider and profile table.
///
/// Cheap to clone; clones share the same tables and change feed.
#[derive(Clone)]
pub struct MemoryBackend<E: Environment> {
    env: E,
    config: MemoryBackendConfig,
    inner: Arc<Mutex<Inner>>,
    feed: AuthChangeFeed,
}

impl<E: Environment> MemoryBackend<E> {
    /// Create an empty backend.
    pub fn new(env: E, config: MemoryBackendConfig) -> Self {
        let profiles = config.profiles_table.then(HashMap::new);
        Self {
            env,
            config,
            inner: Arc::new(Mutex::new(Inner {
                accounts: HashMap::new(),
                current: None,
                profiles,
                reset_requests: Vec::new(),
                next_user: 1,
                next_token: 1,
            })),
            feed: AuthChangeFeed::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue_session(&self, inner: &mut Inner, user: User) -> Session {
        let token = inner.next_token;
        inner.next_token += 1;

        let expires_at = self.env.wall_clock_secs() + self.config.session_ttl.as_secs();
        Session {
            access_token: format!("access-{token}"),
            refresh_token: format!("refresh-{token}"),
            expires_at: Some(expires_at),
            user,
        }
    }

    /// Mark an account's email as confirmed so it can sign in.
    ///
    /// Returns `false` if no account uses the email.
    pub fn confirm_email(&self, email: &str) -> bool {
        let mut inner = self.lock();
        match inner.accounts.get_mut(&email.to_lowercase()) {
            Some(account) => {
                account.user.email_verified = true;
                true
            },
            None => false,
        }
    }

    /// Replace the persisted session without emitting a change, as if it had
    /// been restored from device storage.
    pub fn restore_session(&self, session: Option<Session>) {
        self.lock().current = session;
    }

    /// Push a change to subscribers, as the provider would for events that
    /// originate elsewhere (another device, a deep link).
    pub fn emit(&self, change: AuthChange) {
        self.feed.emit(change);
    }

    /// Drop the `profiles` table.
    pub fn drop_profiles_table(&self) {
        self.lock().profiles = None;
    }

    /// Number of stored profile rows. `None` if the table is missing.
    pub fn profile_count(&self) -> Option<usize> {
        self.lock().profiles.as_ref().map(HashMap::len)
    }

    /// Emails that requested a password reset, oldest first.
    pub fn reset_requests(&self) -> Vec<String> {
        self.lock().reset_requests.clone()
    }

    /// Number of live auth-change subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }
}

#[async_trait]
impl<E: Environment> AuthClient for MemoryBackend<E> {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<SignUpResponse, AuthError> {
        if password.len() < self.config.min_password_length {
            return Err(AuthError::Provider {
                status: 422,
                message: format!(
                    "password should be at least {} characters",
                    self.config.min_password_length
                ),
            });
        }

        let key = email.to_lowercase();
        let response = {
            let mut inner = self.lock();
            if inner.accounts.contains_key(&key) {
                return Err(AuthError::AlreadyRegistered);
            }

            let id = UserId::new(format!("user-{:08}", inner.next_user));
            inner.next_user += 1;

            let user = User {
                id: id.clone(),
                email: email.to_string(),
                email_verified: !self.config.require_email_confirmation,
            };
            inner
                .accounts
                .insert(key, Account { user: user.clone(), password: password.to_string() });

            let now = self.env.wall_clock_secs();
            match inner.profiles.as_mut() {
                Some(profiles) => {
                    profiles.insert(id, Profile::for_user(&user, metadata.user_level, now));
                },
                None => {
                    tracing::warn!(user_id = %user.id, "no profiles table, profile not created");
                },
            }

            let session = if self.config.require_email_confirmation {
                None
            } else {
                let session = self.issue_session(&mut inner, user.clone());
                inner.current = Some(session.clone());
                Some(session)
            };

            SignUpResponse { user, session }
        };

        if let Some(session) = &response.session {
            self.feed.emit(AuthChange::signed_in(session.clone()));
        }
        Ok(response)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = {
            let mut inner = self.lock();
            let account =
                inner.accounts.get(&email.to_lowercase()).ok_or(AuthError::InvalidCredentials)?;
            if account.password != password {
                return Err(AuthError::InvalidCredentials);
            }
            if !account.user.email_verified {
                return Err(AuthError::EmailNotConfirmed);
            }

            let user = account.user.clone();
            let session = self.issue_session(&mut inner, user);
            inner.current = Some(session.clone());
            session
        };

        self.feed.emit(AuthChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let had_session = self.lock().current.take().is_some();
        if had_session {
            self.feed.emit(AuthChange::signed_out());
        }
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.lock().current.clone())
    }

    async fn get_current_user(&self) -> Result<Option<User>, AuthError> {
        let inner = self.lock();
        let session = inner.current.as_ref().ok_or(AuthError::SessionMissing)?;
        if session.is_expired_at(self.env.wall_clock_secs()) {
            return Err(AuthError::SessionMissing);
        }

        let email = session.user.email.to_lowercase();
        Ok(inner.accounts.get(&email).map(|account| account.user.clone()))
    }

    async fn refresh_session(&self) -> Result<Session, AuthError> {
        let session = {
            let mut inner = self.lock();
            let current = inner.current.as_ref().ok_or(AuthError::SessionMissing)?;

            let email = current.user.email.to_lowercase();
            let user = inner
                .accounts
                .get(&email)
                .map_or_else(|| current.user.clone(), |account| account.user.clone());

            let session = self.issue_session(&mut inner, user);
            inner.current = Some(session.clone());
            session
        };

        self.feed.emit(AuthChange::token_refreshed(session.clone()));
        Ok(session)
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<(), AuthError> {
        // Unknown emails succeed too, so the endpoint does not leak which
        // addresses have accounts.
        self.lock().reset_requests.push(email.to_string());
        Ok(())
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.feed.subscribe()
    }
}

#[async_trait]
impl<E: Environment> ProfileStore for MemoryBackend<E> {
    async fn get_by_id(&self, id: &UserId) -> Result<Option<Profile>, ProfileError> {
        let inner = self.lock();
        let profiles = inner
            .profiles
            .as_ref()
            .ok_or_else(|| ProfileError::TableMissing { table: PROFILES_TABLE.to_string() })?;
        Ok(profiles.get(id).cloned())
    }

    async fn update(&self, id: &UserId, update: ProfileUpdate) -> Result<Profile, ProfileError> {
        let now = self.env.wall_clock_secs();
        let mut inner = self.lock();
        let profiles = inner
            .profiles
            .as_mut()
            .ok_or_else(|| ProfileError::TableMissing { table: PROFILES_TABLE.to_string() })?;
        let profile = profiles.get_mut(id).ok_or_else(|| ProfileError::NotFound(id.clone()))?;

        update.apply(profile, now);
        Ok(profile.clone())
    }

    async fn delete(&self, id: &UserId) -> Result<(), ProfileError> {
        let mut inner = self.lock();
        let profiles = inner
            .profiles
            .as_mut()
            .ok_or_else(|| ProfileError::TableMissing { table: PROFILES_TABLE.to_string() })?;
        profiles.remove(id);
        Ok(())
    }
}
