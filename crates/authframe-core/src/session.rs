//! Session and user records.
//!
//! A [`Session`] is the credential bundle issued by the authentication
//! provider. It is only ever exposed as "signed in" while its expiry lies in
//! the future; [`Session::validity`] is the single place that rule lives.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Stable identifier of an authenticated user.
///
/// Opaque string assigned by the authentication provider (a UUID in hosted
/// backends). Also the primary key of the user's profile row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a provider-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity record owned by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider-assigned unique ID.
    pub id: UserId,
    /// Email address used to sign in.
    pub email: String,
    /// Whether the email address has been confirmed.
    pub email_verified: bool,
}

/// Access credential bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token sent with every backend request.
    pub access_token: String,
    /// Token exchanged for a new session on refresh.
    pub refresh_token: String,
    /// Expiry in seconds since the Unix epoch. `None` if the provider did not
    /// report one, which is treated as already expired.
    pub expires_at: Option<u64>,
    /// User the session was issued to.
    pub user: User,
}

/// Result of checking a session against the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionValidity {
    /// Usable as-is.
    Valid,
    /// Still valid, but expires inside the refresh-ahead window. Refresh
    /// before accepting.
    RefreshDue,
    /// Expired, missing an expiry, or missing an access token.
    Invalid,
}

impl Session {
    /// Classify the session at `now_secs` (seconds since the Unix epoch).
    ///
    /// # Invariants
    ///
    /// - `now_secs >= expires_at` is always [`SessionValidity::Invalid`]
    /// - `expires_at - now_secs < refresh_ahead` is
    ///   [`SessionValidity::RefreshDue`]
    pub fn validity(&self, now_secs: u64, refresh_ahead: Duration) -> SessionValidity {
        let Some(expires_at) = self.expires_at else {
            return SessionValidity::Invalid;
        };

        if self.access_token.is_empty() || now_secs >= expires_at {
            SessionValidity::Invalid
        } else if expires_at - now_secs < refresh_ahead.as_secs() {
            SessionValidity::RefreshDue
        } else {
            SessionValidity::Valid
        }
    }

    /// Whether the session is expired (or unusable) at `now_secs`.
    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        self.validity(now_secs, Duration::ZERO) == SessionValidity::Invalid
    }

    /// Seconds until expiry. `None` if already expired or no expiry is known.
    pub fn remaining_secs(&self, now_secs: u64) -> Option<u64> {
        self.expires_at.and_then(|expires_at| expires_at.checked_sub(now_secs)).filter(|s| *s > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;
    const WINDOW: Duration = Duration::from_secs(300);

    fn session(expires_at: Option<u64>) -> Session {
        Session {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at,
            user: User { id: UserId::new("u1"), email: "a@b.com".into(), email_verified: true },
        }
    }

    #[test]
    fn missing_expiry_is_invalid() {
        assert_eq!(session(None).validity(NOW, WINDOW), SessionValidity::Invalid);
    }

    #[test]
    fn expiry_boundary_is_invalid() {
        assert_eq!(session(Some(NOW)).validity(NOW, WINDOW), SessionValidity::Invalid);
        assert_eq!(session(Some(NOW - 1)).validity(NOW, WINDOW), SessionValidity::Invalid);
    }

    #[test]
    fn inside_window_needs_refresh() {
        assert_eq!(session(Some(NOW + 1)).validity(NOW, WINDOW), SessionValidity::RefreshDue);
        assert_eq!(session(Some(NOW + 299)).validity(NOW, WINDOW), SessionValidity::RefreshDue);
    }

    #[test]
    fn outside_window_is_valid() {
        assert_eq!(session(Some(NOW + 300)).validity(NOW, WINDOW), SessionValidity::Valid);
        assert_eq!(session(Some(NOW + 3600)).validity(NOW, WINDOW), SessionValidity::Valid);
    }

    #[test]
    fn empty_access_token_is_invalid() {
        let mut s = session(Some(NOW + 3600));
        s.access_token.clear();
        assert_eq!(s.validity(NOW, WINDOW), SessionValidity::Invalid);
    }

    #[test]
    fn remaining_secs() {
        assert_eq!(session(Some(NOW + 60)).remaining_secs(NOW), Some(60));
        assert_eq!(session(Some(NOW)).remaining_secs(NOW), None);
        assert_eq!(session(None).remaining_secs(NOW), None);
    }

    #[test]
    fn user_id_serializes_as_plain_string() {
        let id = UserId::new("8c6f");
        assert_eq!(id.to_string(), "8c6f");
        assert_eq!(id.as_str(), "8c6f");
    }
}
