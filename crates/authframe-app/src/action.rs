//! Side effects requested by the session machine.
//!
//! The [`crate::SessionMachine`] never performs I/O. Each [`SessionAction`] is
//! an instruction for the runtime, whose result (if any) comes back as a
//! [`crate::SessionEvent`].

use std::time::Duration;

use authframe_core::UserId;

use crate::ProfilePurpose;

/// Actions produced by the session machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Fetch the persisted session. Answered by
    /// [`SessionLoaded`](crate::SessionEvent::SessionLoaded).
    LoadSession {
        /// Initialization attempt the result belongs to.
        attempt: u64,
    },

    /// Exchange the refresh token for a new session. Answered by
    /// [`SessionRefreshed`](crate::SessionEvent::SessionRefreshed).
    RefreshSession {
        /// Initialization attempt, or `None` for a freshness check.
        attempt: Option<u64>,
    },

    /// Best-effort profile fetch. Answered by
    /// [`ProfileLoaded`](crate::SessionEvent::ProfileLoaded).
    FetchProfile {
        /// Whose profile.
        user_id: UserId,
        /// What the fetch completes.
        purpose: ProfilePurpose,
    },

    /// Start the initialization watchdog.
    ArmWatchdog {
        /// Attempt the watchdog guards.
        attempt: u64,
        /// Time until it fires.
        timeout: Duration,
    },

    /// Stop the pending watchdog, if any.
    CancelWatchdog,

    /// Publish the current [`crate::AuthState`] to observers.
    Publish,

    /// Log a message.
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },
}

/// Log levels for machine log actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}
