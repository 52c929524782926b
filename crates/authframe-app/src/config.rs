//! Session store configuration.

use std::time::Duration;

use authframe_core::{AccessPolicy, UserLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default startup watchdog
const DEFAULT_WATCHDOG_TIMEOUT_SECS: u64 = 10;

/// Default refresh window before expiry
const DEFAULT_REFRESH_AHEAD_SECS: u64 = 300;

/// Upper bound on the watchdog; longer stalls leave the user on a spinner
const MAX_WATCHDOG_TIMEOUT_SECS: u64 = 60;

/// Invalid [`SessionConfig`] value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The watchdog would fire immediately.
    #[error("watchdog timeout must be at least one second")]
    WatchdogDisabled,

    /// The watchdog would leave the app loading for too long.
    #[error("watchdog timeout {secs}s exceeds the {max}s limit")]
    WatchdogTooLong {
        /// Requested timeout.
        secs: u64,
        /// Upper bound.
        max: u64,
    },
}

/// Session store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Time after which initialization stops blocking the UI
    pub watchdog_timeout_secs: u64,
    /// Sessions expiring sooner than this are refreshed before use
    pub refresh_ahead_secs: u64,
    /// Level requested at sign-up when the caller does not choose one
    pub default_user_level: UserLevel,
    /// Admin allowlist
    pub access: AccessPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_secs: DEFAULT_WATCHDOG_TIMEOUT_SECS,
            refresh_ahead_secs: DEFAULT_REFRESH_AHEAD_SECS,
            default_user_level: UserLevel::Creator,
            access: AccessPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watchdog_timeout_secs == 0 {
            return Err(ConfigError::WatchdogDisabled);
        }
        if self.watchdog_timeout_secs > MAX_WATCHDOG_TIMEOUT_SECS {
            return Err(ConfigError::WatchdogTooLong {
                secs: self.watchdog_timeout_secs,
                max: MAX_WATCHDOG_TIMEOUT_SECS,
            });
        }
        Ok(())
    }

    /// Startup watchdog timeout.
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_secs(self.watchdog_timeout_secs)
    }

    /// Refresh window before expiry.
    pub fn refresh_ahead(&self) -> Duration {
        Duration::from_secs(self.refresh_ahead_secs)
    }
}
