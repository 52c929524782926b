//! Session lifecycle state machine.
//!
//! [`SessionMachine`] owns the [`AuthState`] and decides every transition. It
//! consumes [`SessionEvent`]s and produces [`SessionAction`]s; it never
//! performs I/O and never reads a clock, so the same code runs under real
//! time in production and under virtual time in tests.
//!
//! # Phases
//!
//! ```text
//! Idle --Start--> Initializing{attempt} --finish / watchdog--> Ready --Dispose--> Disposed
//!                          ^                                     |
//!                          +---------------Start-----------------+
//! ```
//!
//! Remote auth changes are only applied in [`Phase::Ready`]. Results tagged
//! with an attempt other than the current one are stale and dropped.

use std::time::Duration;

use authframe_client::{AuthChange, AuthChangeKind};
use authframe_core::{AuthError, Profile, Session, SessionValidity, User, UserId};

use crate::{AuthState, LogLevel, ProfilePurpose, SessionAction, SessionConfig, SessionEvent};

/// Lifecycle phase of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started.
    Idle,
    /// Resolving the persisted session.
    Initializing {
        /// Current attempt.
        attempt: u64,
    },
    /// Initialization finished or was abandoned; remote events are applied.
    Ready,
    /// Disposed; every event is ignored.
    Disposed,
}

/// Pure session lifecycle machine.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: AuthState,
    phase: Phase,
    /// Attempt number handed out by the next `Start`
    next_attempt: u64,
    watchdog_timeout: Duration,
    refresh_ahead: Duration,
}

impl SessionMachine {
    /// Create an idle machine.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            state: AuthState::initial(),
            phase: Phase::Idle,
            next_attempt: 1,
            watchdog_timeout: config.watchdog_timeout(),
            refresh_ahead: config.refresh_ahead(),
        }
    }

    /// Current state.
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether remote events are being applied.
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        if self.phase == Phase::Disposed {
            return vec![];
        }

        match event {
            SessionEvent::Start => self.handle_start(),
            SessionEvent::SessionLoaded { attempt, result, now_secs } => {
                self.handle_session_loaded(attempt, result, now_secs)
            },
            SessionEvent::SessionRefreshed { attempt: Some(attempt), result, now_secs } => {
                self.handle_init_refresh(attempt, result, now_secs)
            },
            SessionEvent::SessionRefreshed { attempt: None, result, now_secs } => {
                self.handle_freshness_refresh(result, now_secs)
            },
            SessionEvent::ProfileLoaded { user_id, profile, purpose } => {
                self.handle_profile_loaded(&user_id, profile, purpose)
            },
            SessionEvent::WatchdogFired { attempt } => self.handle_watchdog(attempt),
            SessionEvent::Remote { change, now_secs } => self.handle_remote(change, now_secs),
            SessionEvent::SignInStarted | SessionEvent::SignOutStarted => {
                self.state.loading = true;
                vec![SessionAction::Publish]
            },
            SessionEvent::SignInFailed => {
                self.state.loading = false;
                vec![SessionAction::Publish]
            },
            SessionEvent::SignOutFinished => {
                self.state.clear();
                self.state.loading = false;
                vec![log(LogLevel::Info, "signed out locally"), SessionAction::Publish]
            },
            SessionEvent::FreshnessCheck { now_secs } => self.handle_freshness_check(now_secs),
            SessionEvent::UserReloaded { user } => self.handle_user_reloaded(user),
            SessionEvent::ProfileUpdated { profile } => self.handle_profile_updated(profile),
            SessionEvent::Dispose => {
                self.phase = Phase::Disposed;
                vec![SessionAction::CancelWatchdog, log(LogLevel::Debug, "session store disposed")]
            },
        }
    }

    fn handle_start(&mut self) -> Vec<SessionAction> {
        if let Phase::Initializing { attempt } = self.phase {
            let message = format!("initialization attempt {attempt} already running");
            return vec![log(LogLevel::Debug, message)];
        }

        let attempt = self.next_attempt;
        self.next_attempt += 1;
        self.phase = Phase::Initializing { attempt };
        self.state.loading = true;

        vec![
            SessionAction::Publish,
            SessionAction::ArmWatchdog { attempt, timeout: self.watchdog_timeout },
            SessionAction::LoadSession { attempt },
        ]
    }

    fn handle_session_loaded(
        &mut self,
        attempt: u64,
        result: Result<Option<Session>, AuthError>,
        now_secs: u64,
    ) -> Vec<SessionAction> {
        if !self.is_current_attempt(attempt) {
            return vec![stale("session lookup", attempt)];
        }

        let session = match result {
            Ok(Some(session)) => session,
            Ok(None) => {
                self.state.clear();
                return self.finish_init(vec![]);
            },
            Err(e) => {
                self.state.clear();
                let warn = log(LogLevel::Warn, format!("failed to load persisted session: {e}"));
                return self.finish_init(vec![warn]);
            },
        };

        match session.validity(now_secs, self.refresh_ahead) {
            SessionValidity::Invalid => {
                self.state.clear();
                let info = log(LogLevel::Info, "persisted session expired, signing out");
                self.finish_init(vec![info])
            },
            SessionValidity::RefreshDue => vec![
                log(LogLevel::Debug, "persisted session inside refresh window, refreshing"),
                SessionAction::RefreshSession { attempt: Some(attempt) },
            ],
            SessionValidity::Valid => self.adopt_for_init(attempt, session),
        }
    }

    fn handle_init_refresh(
        &mut self,
        attempt: u64,
        result: Result<Session, AuthError>,
        now_secs: u64,
    ) -> Vec<SessionAction> {
        if !self.is_current_attempt(attempt) {
            return vec![stale("session refresh", attempt)];
        }

        match result {
            Ok(session) if self.is_usable(&session, now_secs) => {
                self.adopt_for_init(attempt, session)
            },
            Ok(_) => {
                self.state.clear();
                let warn = log(LogLevel::Warn, "refreshed session is already invalid, signing out");
                self.finish_init(vec![warn])
            },
            Err(e) => {
                self.state.clear();
                let warn = log(LogLevel::Warn, format!("session refresh failed, signing out: {e}"));
                self.finish_init(vec![warn])
            },
        }
    }

    fn handle_freshness_refresh(
        &mut self,
        result: Result<Session, AuthError>,
        now_secs: u64,
    ) -> Vec<SessionAction> {
        // Signed out (or re-initializing) while the refresh was in flight
        if !self.is_ready() || self.state.session.is_none() {
            return vec![log(LogLevel::Debug, "discarding refresh result, no session to refresh")];
        }

        match result {
            Ok(session) if self.is_usable(&session, now_secs) => {
                self.adopt(session);
                vec![log(LogLevel::Debug, "session refreshed"), SessionAction::Publish]
            },
            Ok(_) => self.sign_out_locally("refreshed session is already invalid"),
            Err(e) if e.is_transient() => {
                vec![log(LogLevel::Warn, format!("session refresh failed, keeping session: {e}"))]
            },
            Err(e) => self.sign_out_locally(&format!("session refresh rejected: {e}")),
        }
    }

    fn handle_profile_loaded(
        &mut self,
        user_id: &UserId,
        profile: Option<Profile>,
        purpose: ProfilePurpose,
    ) -> Vec<SessionAction> {
        let profile = profile.filter(|p| &p.id == user_id);
        let for_current_user = self.current_user_id() == Some(user_id);

        match purpose {
            ProfilePurpose::Initialize { attempt } if self.is_current_attempt(attempt) => {
                if for_current_user {
                    self.state.profile = profile;
                }
                self.finish_init(vec![])
            },
            ProfilePurpose::Initialize { attempt } => match profile {
                Some(profile) if for_current_user && self.is_ready() => {
                    self.state.profile = Some(profile);
                    let message = format!("applied late profile from attempt {attempt}");
                    vec![log(LogLevel::Debug, message), SessionAction::Publish]
                },
                _ => vec![stale("profile fetch", attempt)],
            },
            ProfilePurpose::SignedIn => {
                let mut actions = Vec::new();
                if for_current_user {
                    self.state.profile = profile;
                } else {
                    actions.push(log(
                        LogLevel::Debug,
                        format!("discarding profile for {user_id}, no longer signed in"),
                    ));
                }
                self.state.loading = false;
                actions.push(SessionAction::Publish);
                actions
            },
        }
    }

    fn handle_watchdog(&mut self, attempt: u64) -> Vec<SessionAction> {
        if !self.is_current_attempt(attempt) {
            return vec![];
        }

        self.phase = Phase::Ready;
        self.state.loading = false;
        vec![
            log(
                LogLevel::Warn,
                format!("initialization attempt {attempt} timed out, releasing loading"),
            ),
            SessionAction::Publish,
        ]
    }

    fn handle_remote(&mut self, change: AuthChange, now_secs: u64) -> Vec<SessionAction> {
        if !self.is_ready() {
            return vec![log(
                LogLevel::Debug,
                format!("ignoring {} before initialization completes", change.kind.as_wire()),
            )];
        }

        let valid_session = change.session.filter(|s| self.is_usable(s, now_secs));

        match (change.kind, valid_session) {
            (AuthChangeKind::SignedIn, Some(session)) => {
                let user_id = session.user.id.clone();
                self.adopt(session);
                vec![
                    log(LogLevel::Info, format!("signed in as {user_id}")),
                    SessionAction::FetchProfile { user_id, purpose: ProfilePurpose::SignedIn },
                ]
            },
            (AuthChangeKind::TokenRefreshed, Some(session)) => {
                self.adopt(session);
                self.state.loading = false;
                vec![log(LogLevel::Debug, "token refreshed"), SessionAction::Publish]
            },
            (AuthChangeKind::SignedIn | AuthChangeKind::TokenRefreshed, None) => {
                self.sign_out_locally("auth change carried no valid session")
            },
            (AuthChangeKind::SignedOut, _) => self.sign_out_locally("signed out remotely"),
            (AuthChangeKind::Other(name), _) => {
                vec![log(LogLevel::Debug, format!("ignoring auth change {name}"))]
            },
        }
    }

    fn handle_freshness_check(&mut self, now_secs: u64) -> Vec<SessionAction> {
        if !self.is_ready() {
            return vec![];
        }
        let Some(session) = &self.state.session else {
            return vec![];
        };

        match session.validity(now_secs, self.refresh_ahead) {
            SessionValidity::Invalid => self.sign_out_locally("session expired"),
            SessionValidity::RefreshDue => vec![SessionAction::RefreshSession { attempt: None }],
            SessionValidity::Valid => vec![],
        }
    }

    fn handle_user_reloaded(&mut self, user: User) -> Vec<SessionAction> {
        if self.current_user_id() != Some(&user.id) {
            return vec![log(LogLevel::Debug, format!("discarding reloaded user {}", user.id))];
        }

        if let Some(session) = &mut self.state.session {
            session.user = user.clone();
        }
        self.state.user = Some(user);
        vec![SessionAction::Publish]
    }

    fn handle_profile_updated(&mut self, profile: Profile) -> Vec<SessionAction> {
        if self.current_user_id() != Some(&profile.id) {
            let message = format!("discarding profile update for {}", profile.id);
            return vec![log(LogLevel::Debug, message)];
        }

        self.state.profile = Some(profile);
        vec![SessionAction::Publish]
    }

    /// Adopt a session mid-initialization and fetch its profile.
    fn adopt_for_init(&mut self, attempt: u64, session: Session) -> Vec<SessionAction> {
        let user_id = session.user.id.clone();
        self.adopt(session);
        let purpose = ProfilePurpose::Initialize { attempt };
        vec![SessionAction::FetchProfile { user_id, purpose }]
    }

    /// Replace session and user. The cached profile survives only if the user
    /// is unchanged.
    fn adopt(&mut self, session: Session) {
        if self.current_user_id() != Some(&session.user.id) {
            self.state.profile = None;
        }
        self.state.user = Some(session.user.clone());
        self.state.session = Some(session);
    }

    fn sign_out_locally(&mut self, reason: &str) -> Vec<SessionAction> {
        self.state.clear();
        self.state.loading = false;
        vec![log(LogLevel::Info, format!("{reason}, clearing session")), SessionAction::Publish]
    }

    fn finish_init(&mut self, mut actions: Vec<SessionAction>) -> Vec<SessionAction> {
        self.phase = Phase::Ready;
        self.state.loading = false;

        let summary = match &self.state.user {
            Some(user) => format!("session initialized for {}", user.id),
            None => "session initialized, signed out".to_string(),
        };
        actions.extend([
            SessionAction::CancelWatchdog,
            SessionAction::Publish,
            log(LogLevel::Info, summary),
        ]);
        actions
    }

    /// Whether a session may be adopted at `now_secs`.
    fn is_usable(&self, session: &Session, now_secs: u64) -> bool {
        session.validity(now_secs, self.refresh_ahead) != SessionValidity::Invalid
    }

    fn is_current_attempt(&self, attempt: u64) -> bool {
        self.phase == Phase::Initializing { attempt }
    }

    fn current_user_id(&self) -> Option<&UserId> {
        self.state.user.as_ref().map(|u| &u.id)
    }
}

fn log(level: LogLevel, message: impl Into<String>) -> SessionAction {
    SessionAction::Log { level, message: message.into() }
}

fn stale(what: &str, attempt: u64) -> SessionAction {
    log(LogLevel::Debug, format!("discarding {what} result from abandoned attempt {attempt}"))
}
