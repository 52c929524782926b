//! Auth-state invariant checks.

use super::{AuthSnapshot, Invariant, InvariantResult, Violation};

/// `user` is set iff `session` is set, and both name the same user.
pub struct UserMatchesSession;

impl Invariant for UserMatchesSession {
    fn name(&self) -> &'static str {
        "user_matches_session"
    }

    fn check(&self, snapshot: &AuthSnapshot) -> InvariantResult {
        let state = &snapshot.state;
        match (&state.user, &state.session) {
            (None, None) => Ok(()),
            (Some(user), Some(session)) if user.id == session.user.id => Ok(()),
            (Some(user), Some(session)) => Err(Violation {
                invariant: self.name(),
                message: format!("user {} but session for {}", user.id, session.user.id),
            }),
            (user, session) => Err(Violation {
                invariant: self.name(),
                message: format!(
                    "user set: {}, session set: {}",
                    user.is_some(),
                    session.is_some()
                ),
            }),
        }
    }
}

/// A cached profile belongs to the signed-in user.
///
/// A profile without a user would leak one account's data into the next.
pub struct ProfileBelongsToUser;

impl Invariant for ProfileBelongsToUser {
    fn name(&self) -> &'static str {
        "profile_belongs_to_user"
    }

    fn check(&self, snapshot: &AuthSnapshot) -> InvariantResult {
        let state = &snapshot.state;
        let Some(profile) = &state.profile else {
            return Ok(());
        };

        match &state.user {
            Some(user) if user.id == profile.id => Ok(()),
            Some(user) => Err(Violation {
                invariant: self.name(),
                message: format!("profile {} cached for user {}", profile.id, user.id),
            }),
            None => Err(Violation {
                invariant: self.name(),
                message: format!("profile {} cached while signed out", profile.id),
            }),
        }
    }
}

/// No held session is expired or malformed at snapshot time.
///
/// Only meaningful for snapshots taken at the clock the machine last saw;
/// sessions legitimately age past expiry between freshness checks.
pub struct NoExpiredSession;

impl Invariant for NoExpiredSession {
    fn name(&self) -> &'static str {
        "no_expired_session"
    }

    fn check(&self, snapshot: &AuthSnapshot) -> InvariantResult {
        let Some(session) = &snapshot.state.session else {
            return Ok(());
        };

        if session.access_token.is_empty() {
            return Err(Violation {
                invariant: self.name(),
                message: format!("session for {} has an empty access token", session.user.id),
            });
        }

        match session.expires_at {
            Some(expires_at) if expires_at > snapshot.now_secs => Ok(()),
            Some(expires_at) => Err(Violation {
                invariant: self.name(),
                message: format!(
                    "session for {} expired at {expires_at}, now {}",
                    session.user.id, snapshot.now_secs
                ),
            }),
            None => Err(Violation {
                invariant: self.name(),
                message: format!("session for {} has no expiry", session.user.id),
            }),
        }
    }
}
