//! User levels and role checks.
//!
//! Levels are totally ordered by privilege (`Creator < Manager < Executive <
//! Admin`), so every permission question reduces to a single comparison in
//! [`has_role`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Profile, User};

/// Ordered role enum gating feature visibility.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UserLevel {
    /// Basic user with content creation abilities.
    #[default]
    Creator,
    /// Team management and project oversight.
    Manager,
    /// Strategic oversight and decision making.
    Executive,
    /// Full system administration access.
    Admin,
}

impl UserLevel {
    /// All levels in increasing order of privilege.
    pub const ALL: [Self; 4] = [Self::Creator, Self::Manager, Self::Executive, Self::Admin];

    /// Position in the privilege hierarchy, starting at 1.
    pub fn rank(self) -> u8 {
        match self {
            Self::Creator => 1,
            Self::Manager => 2,
            Self::Executive => 3,
            Self::Admin => 4,
        }
    }

    /// Lowercase wire name, as stored in the profile row.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Manager => "manager",
            Self::Executive => "executive",
            Self::Admin => "admin",
        }
    }

    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Creator => "Creator",
            Self::Manager => "Manager",
            Self::Executive => "Executive",
            Self::Admin => "Admin",
        }
    }

    /// One-line description of what the level grants.
    pub fn description(self) -> &'static str {
        match self {
            Self::Creator => "Basic user with content creation abilities",
            Self::Manager => "Team management and project oversight",
            Self::Executive => "Strategic oversight and decision making",
            Self::Admin => "Full system administration access",
        }
    }
}

impl fmt::Display for UserLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown user level string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown user level: {0:?}")]
pub struct ParseUserLevelError(pub String);

impl FromStr for UserLevel {
    type Err = ParseUserLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseUserLevelError(s.to_string()))
    }
}

/// Whether `profile` grants at least `minimum`.
///
/// A missing profile grants nothing, so screens gated on a role stay hidden
/// until the profile has been fetched.
pub fn has_role(profile: Option<&Profile>, minimum: UserLevel) -> bool {
    profile.is_some_and(|p| p.user_level >= minimum)
}

/// Admin access rules.
///
/// The profile's level is the primary source. `admin_emails` is an explicit
/// allowlist that grants the admin check to listed accounts regardless of
/// their profile (or lack of one). It never affects lower levels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPolicy {
    /// Emails that are always treated as administrators.
    pub admin_emails: Vec<String>,
}

impl AccessPolicy {
    /// Policy with the given admin allowlist.
    pub fn with_admin_emails<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { admin_emails: emails.into_iter().map(Into::into).collect() }
    }

    /// Whether the signed-in user may access admin features.
    pub fn is_admin(&self, user: Option<&User>, profile: Option<&Profile>) -> bool {
        has_role(profile, UserLevel::Admin) || user.is_some_and(|u| self.is_allowlisted(&u.email))
    }

    fn is_allowlisted(&self, email: &str) -> bool {
        let email = email.trim();
        self.admin_emails.iter().any(|admin| admin.trim().eq_ignore_ascii_case(email))
    }
}
