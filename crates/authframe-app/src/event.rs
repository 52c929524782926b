//! Inputs to the session machine.

use authframe_client::AuthChange;
use authframe_core::{AuthError, Profile, Session, User, UserId};

/// Why a profile was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilePurpose {
    /// Last step of an initialization attempt.
    Initialize {
        /// Attempt being completed.
        attempt: u64,
    },
    /// Follow-up to a remote sign-in.
    SignedIn,
}

/// Events consumed by the session machine.
///
/// Events carrying `now_secs` were stamped by the runtime with the wall clock
/// at the moment the result arrived; the machine never reads a clock itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Begin initialization.
    Start,

    /// Persisted session lookup finished.
    SessionLoaded {
        /// Attempt that requested the lookup.
        attempt: u64,
        /// Lookup result.
        result: Result<Option<Session>, AuthError>,
        /// Wall clock, seconds since the Unix epoch.
        now_secs: u64,
    },

    /// Session refresh finished.
    SessionRefreshed {
        /// Initialization attempt, or `None` for a freshness check.
        attempt: Option<u64>,
        /// Refresh result.
        result: Result<Session, AuthError>,
        /// Wall clock, seconds since the Unix epoch.
        now_secs: u64,
    },

    /// Best-effort profile fetch finished. Failures arrive as `None`.
    ProfileLoaded {
        /// Whose profile was fetched.
        user_id: UserId,
        /// Fetched profile.
        profile: Option<Profile>,
        /// What the fetch completes.
        purpose: ProfilePurpose,
    },

    /// The initialization watchdog expired.
    WatchdogFired {
        /// Attempt the watchdog guarded.
        attempt: u64,
    },

    /// Auth-state change pushed by the provider.
    Remote {
        /// The change.
        change: AuthChange,
        /// Wall clock, seconds since the Unix epoch.
        now_secs: u64,
    },

    /// A sign-in request was sent.
    SignInStarted,

    /// A sign-in request was rejected.
    SignInFailed,

    /// A sign-out request was sent.
    SignOutStarted,

    /// A sign-out request finished, successfully or not.
    SignOutFinished,

    /// Caller-triggered expiry and refresh-window check.
    FreshnessCheck {
        /// Wall clock, seconds since the Unix epoch.
        now_secs: u64,
    },

    /// Identity record re-read from the provider.
    UserReloaded {
        /// Fresh user record.
        user: User,
    },

    /// The current user's profile was updated.
    ProfileUpdated {
        /// Updated profile.
        profile: Profile,
    },

    /// Stop processing events.
    Dispose,
}
