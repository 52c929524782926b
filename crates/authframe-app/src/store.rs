//! Async session store.
//!
//! [`SessionStore`] drives a [`SessionMachine`] against the backend
//! collaborators. It owns three kinds of background work:
//!
//! - the init task, which executes the actions produced by `Start`
//! - the watchdog, which sleeps on the [`Environment`] clock and then feeds
//!   `WatchdogFired` back into the machine
//! - the listener, which applies remote auth changes one at a time, in
//!   delivery order, each one including its profile fetch
//!
//! The machine sits behind a short-lived lock that is never held across an
//! await. State changes are published on a [`watch`] channel.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use authframe_client::{AuthClient, AuthSubscription, ProfileStore, SignUpMetadata};
use authframe_core::{
    AuthError, Profile, ProfileError, ProfileUpdate, UserId, UserLevel, env::Environment,
};
use tokio::{sync::watch, task::AbortHandle};

use crate::{
    AuthState, ConfigError, LogLevel, Outcome, PASSWORD_RESET_MESSAGE, Phase,
    REGISTRATION_CONFIRMATION_MESSAGE, SessionAction, SessionConfig, SessionEvent, SessionMachine,
};

/// Client-side session lifecycle manager.
///
/// Cheap to clone; clones share the same state and background tasks. Must be
/// used from within a Tokio runtime.
///
/// Operations are not serialized against each other. Callers should not
/// start a sign-in, sign-up or sign-out while another one is in flight
/// (disable the form while `loading` is set); the store does not lock.
///
/// # Type Parameters
///
/// - `A`: Hosted authentication client
/// - `P`: Profile table access
/// - `E`: Clock (real or virtual)
pub struct SessionStore<A, P, E>
where
    A: AuthClient,
    P: ProfileStore,
    E: Environment,
{
    shared: Arc<Shared<A, P, E>>,
}

impl<A, P, E> Clone for SessionStore<A, P, E>
where
    A: AuthClient,
    P: ProfileStore,
    E: Environment,
{
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

struct Shared<A, P, E> {
    auth: A,
    profiles: P,
    env: E,
    config: SessionConfig,
    machine: Mutex<SessionMachine>,
    state_tx: watch::Sender<AuthState>,
    tasks: Mutex<Tasks>,
}

/// Handles of running background tasks.
#[derive(Default)]
struct Tasks {
    listener: Option<AbortHandle>,
    init: Option<AbortHandle>,
    watchdog: Option<AbortHandle>,
}

impl<A, P, E> SessionStore<A, P, E>
where
    A: AuthClient,
    P: ProfileStore,
    E: Environment,
{
    /// Create an idle store. Nothing happens until [`Self::start`].
    ///
    /// Fails if `config` does not pass [`SessionConfig::validate`].
    pub fn new(auth: A, profiles: P, env: E, config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let machine = SessionMachine::new(&config);
        let (state_tx, _) = watch::channel(machine.state().clone());

        Ok(Self {
            shared: Arc::new(Shared {
                auth,
                profiles,
                env,
                config,
                machine: Mutex::new(machine),
                state_tx,
                tasks: Mutex::new(Tasks::default()),
            }),
        })
    }

    /// Subscribe to remote auth changes and start initialization.
    ///
    /// Returns immediately; watch [`Self::watch`] for `loading` to clear.
    /// Calling `start` while initialization is in flight joins the running
    /// attempt. Calling it once initialization has finished re-runs it and
    /// revalidates the persisted session. Does nothing after
    /// [`Self::dispose`].
    pub fn start(&self) {
        let shared = &self.shared;
        if shared.lock_machine().phase() == Phase::Disposed {
            tracing::warn!("start called on a disposed session store");
            return;
        }

        {
            let mut tasks = shared.lock_tasks();
            if tasks.listener.is_none() {
                // Subscribe before initializing so no change is missed
                let subscription = shared.auth.on_auth_state_change();
                let listener = tokio::spawn(Arc::clone(shared).listen(subscription));
                tasks.listener = Some(listener.abort_handle());
            }
        }

        let actions = shared.handle(SessionEvent::Start);
        if !actions.iter().any(|a| matches!(a, SessionAction::LoadSession { .. })) {
            // Already initializing; the running task owns the attempt
            for action in actions {
                shared.apply(action);
            }
            return;
        }
        // Observers must see `loading` before start returns
        shared.publish();

        let init_shared = Arc::clone(shared);
        let init = tokio::spawn(async move { init_shared.execute(actions).await });
        if let Some(previous) = shared.lock_tasks().init.replace(init.abort_handle()) {
            previous.abort();
        }
    }

    /// Stop all background work. Later events and results are ignored.
    pub fn dispose(&self) {
        let actions = self.shared.handle(SessionEvent::Dispose);
        for action in actions {
            self.shared.apply(action);
        }

        let mut tasks = self.shared.lock_tasks();
        for handle in [tasks.listener.take(), tasks.init.take(), tasks.watchdog.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }

    /// Current state.
    pub fn state(&self) -> AuthState {
        self.shared.lock_machine().state().clone()
    }

    /// Receiver notified on every published state change.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.shared.state_tx.subscribe()
    }

    /// Store configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Sign in with email and password.
    ///
    /// On success `loading` stays set until the provider's signed-in change
    /// arrives and the profile has been fetched.
    pub async fn sign_in(&self, email: &str, password: &str) -> Outcome {
        if self.is_disposed() {
            return Outcome::failed(AuthError::Disposed);
        }
        self.shared.dispatch(SessionEvent::SignInStarted).await;

        match self.shared.auth.sign_in(email, password).await {
            Ok(_) => Outcome::ok(),
            Err(e) => {
                tracing::info!(error = %e, "sign in rejected");
                self.shared.dispatch(SessionEvent::SignInFailed).await;
                Outcome::failed(e)
            },
        }
    }

    /// Register with the configured default user level.
    pub async fn sign_up(&self, email: &str, password: &str) -> Outcome {
        self.sign_up_as(email, password, self.shared.config.default_user_level).await
    }

    /// Register with an explicit user level.
    ///
    /// Every success carries the registration message. When the provider
    /// requires email confirmation `confirmation_required` is also set and
    /// the state does not change.
    pub async fn sign_up_as(&self, email: &str, password: &str, user_level: UserLevel) -> Outcome {
        if self.is_disposed() {
            return Outcome::failed(AuthError::Disposed);
        }
        let metadata = SignUpMetadata { user_level };
        match self.shared.auth.sign_up(email, password, metadata).await {
            Ok(response) if response.session.is_none() => {
                tracing::info!(user_id = %response.user.id, "sign up pending email confirmation");
                Outcome::confirmation_required()
            },
            Ok(response) => {
                tracing::info!(user_id = %response.user.id, "signed up");
                Outcome::ok_with_message(REGISTRATION_CONFIRMATION_MESSAGE)
            },
            Err(e) => {
                tracing::info!(error = %e, "sign up rejected");
                Outcome::failed(e)
            },
        }
    }

    /// Sign out. Local state is cleared even if the provider call fails.
    ///
    /// Fails with [`AuthError::Disposed`] after [`Self::dispose`], without
    /// contacting the provider; the frozen state is left as it was.
    pub async fn sign_out(&self) -> Outcome {
        if self.is_disposed() {
            return Outcome::failed(AuthError::Disposed);
        }
        self.shared.dispatch(SessionEvent::SignOutStarted).await;

        let result = self.shared.auth.sign_out().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "remote sign out failed, clearing local session anyway");
        }

        self.shared.dispatch(SessionEvent::SignOutFinished).await;
        Outcome::from(result)
    }

    /// Send a password reset email. Does not touch the session.
    pub async fn reset_password(&self, email: &str) -> Outcome {
        match self.shared.auth.reset_password_for_email(email).await {
            Ok(()) => Outcome::ok_with_message(PASSWORD_RESET_MESSAGE),
            Err(e) => {
                tracing::info!(error = %e, "password reset rejected");
                Outcome::failed(e)
            },
        }
    }

    /// Check the current session against the clock.
    ///
    /// An expired session is cleared. A session inside the refresh window is
    /// refreshed; a rejected refresh clears it, a transient failure keeps it.
    pub async fn ensure_fresh(&self) {
        let now_secs = self.shared.env.wall_clock_secs();
        self.shared.dispatch(SessionEvent::FreshnessCheck { now_secs }).await;
    }

    /// Re-read the signed-in user's identity record from the provider.
    pub async fn reload_user(&self) -> Outcome {
        if self.is_disposed() {
            return Outcome::failed(AuthError::Disposed);
        }
        if self.current_user_id().is_none() {
            return Outcome::failed(AuthError::SessionMissing);
        }

        match self.shared.auth.get_current_user().await {
            Ok(Some(user)) => {
                self.shared.dispatch(SessionEvent::UserReloaded { user }).await;
                Outcome::ok()
            },
            Ok(None) => Outcome::failed(AuthError::SessionMissing),
            Err(e) => Outcome::failed(e),
        }
    }

    /// Update the signed-in user's profile and cache the result.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile, ProfileError> {
        let user_id = self.current_user_id().ok_or(ProfileError::NotSignedIn)?;
        let profile = self.shared.profiles.update(&user_id, update).await?;

        let event = SessionEvent::ProfileUpdated { profile: profile.clone() };
        self.shared.dispatch(event).await;
        Ok(profile)
    }

    /// Whether the cached profile grants at least `minimum`.
    pub fn has_role(&self, minimum: UserLevel) -> bool {
        self.shared.lock_machine().state().has_role(minimum)
    }

    /// Whether the signed-in user is an admin, by profile or allowlist.
    pub fn is_admin(&self) -> bool {
        let machine = self.shared.lock_machine();
        let state = machine.state();
        self.shared.config.access.is_admin(state.user.as_ref(), state.profile.as_ref())
    }

    fn is_disposed(&self) -> bool {
        self.shared.lock_machine().phase() == Phase::Disposed
    }

    fn current_user_id(&self) -> Option<UserId> {
        self.shared.lock_machine().state().user.as_ref().map(|u| u.id.clone())
    }
}

impl<A, P, E> Shared<A, P, E>
where
    A: AuthClient,
    P: ProfileStore,
    E: Environment,
{
    fn lock_machine(&self) -> MutexGuard<'_, SessionMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed one event to the machine.
    fn handle(&self, event: SessionEvent) -> Vec<SessionAction> {
        self.lock_machine().handle(event)
    }

    async fn dispatch(self: &Arc<Self>, event: SessionEvent) {
        let actions = self.handle(event);
        self.execute(actions).await;
    }

    /// Run actions until the machine stops asking for I/O.
    async fn execute(self: &Arc<Self>, actions: Vec<SessionAction>) {
        let mut pending: VecDeque<SessionAction> = actions.into();

        while let Some(action) = pending.pop_front() {
            match action {
                SessionAction::LoadSession { attempt } => {
                    let result = self.auth.get_session().await;
                    let now_secs = self.env.wall_clock_secs();
                    pending.extend(self.handle(SessionEvent::SessionLoaded {
                        attempt,
                        result,
                        now_secs,
                    }));
                },
                SessionAction::RefreshSession { attempt } => {
                    let result = self.auth.refresh_session().await;
                    let now_secs = self.env.wall_clock_secs();
                    pending.extend(self.handle(SessionEvent::SessionRefreshed {
                        attempt,
                        result,
                        now_secs,
                    }));
                },
                SessionAction::FetchProfile { user_id, purpose } => {
                    let profile = self.fetch_profile(&user_id).await;
                    pending.extend(self.handle(SessionEvent::ProfileLoaded {
                        user_id,
                        profile,
                        purpose,
                    }));
                },
                SessionAction::ArmWatchdog { attempt, timeout } => {
                    self.arm_watchdog(attempt, timeout);
                },
                SessionAction::CancelWatchdog
                | SessionAction::Publish
                | SessionAction::Log { .. } => self.apply(action),
            }
        }
    }

    /// Apply an action that needs no I/O.
    ///
    /// Used directly from the watchdog and from `dispose`.
    fn apply(&self, action: SessionAction) {
        match action {
            SessionAction::Publish => self.publish(),
            SessionAction::CancelWatchdog => {
                if let Some(watchdog) = self.lock_tasks().watchdog.take() {
                    watchdog.abort();
                }
            },
            SessionAction::Log { level, message } => log(level, &message),

            // I/O actions shouldn't happen in sync contexts
            SessionAction::LoadSession { .. }
            | SessionAction::RefreshSession { .. }
            | SessionAction::FetchProfile { .. }
            | SessionAction::ArmWatchdog { .. } => {
                tracing::warn!("unexpected I/O action in sync context: {:?}", action);
            },
        }
    }

    fn publish(&self) {
        let state = self.lock_machine().state().clone();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    fn arm_watchdog(self: &Arc<Self>, attempt: u64, timeout: Duration) {
        let shared = Arc::clone(self);
        let watchdog = tokio::spawn(async move {
            shared.env.sleep(timeout).await;
            for action in shared.handle(SessionEvent::WatchdogFired { attempt }) {
                shared.apply(action);
            }
        });

        if let Some(previous) = self.lock_tasks().watchdog.replace(watchdog.abort_handle()) {
            previous.abort();
        }
    }

    /// Best-effort profile lookup. Never fails; problems are logged.
    async fn fetch_profile(&self, user_id: &UserId) -> Option<Profile> {
        match self.profiles.get_by_id(user_id).await {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                tracing::debug!(%user_id, "no profile row for user");
                None
            },
            Err(e) if e.is_missing_resource() => {
                tracing::debug!(%user_id, error = %e, "profile resource missing");
                None
            },
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "profile fetch failed");
                None
            },
        }
    }

    /// Apply remote auth changes one at a time until the feed closes.
    async fn listen(self: Arc<Self>, mut subscription: AuthSubscription) {
        while let Some(change) = subscription.next().await {
            let now_secs = self.env.wall_clock_secs();
            self.dispatch(SessionEvent::Remote { change, now_secs }).await;
        }
        tracing::debug!("auth change feed closed");
    }
}

fn log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => tracing::debug!("{message}"),
        LogLevel::Info => tracing::info!("{message}"),
        LogLevel::Warn => tracing::warn!("{message}"),
        LogLevel::Error => tracing::error!("{message}"),
    }
}
