//! Test data builders.

use authframe_core::{Profile, Session, User, UserId, UserLevel};

use crate::SimEnv;

/// Default wall clock of [`SimEnv::new`].
pub const NOW: u64 = SimEnv::DEFAULT_EPOCH;

/// Verified user `id` with email `{id}@example.com`.
pub fn user(id: &str) -> User {
    User { id: UserId::new(id), email: format!("{id}@example.com"), email_verified: true }
}

/// Session for [`user`] `id` expiring at `expires_at`.
pub fn session_for(id: &str, expires_at: u64) -> Session {
    Session {
        access_token: format!("access-{id}-{expires_at}"),
        refresh_token: format!("refresh-{id}"),
        expires_at: Some(expires_at),
        user: user(id),
    }
}

/// Profile row for [`user`] `id`.
pub fn profile(id: &str, user_level: UserLevel) -> Profile {
    Profile::for_user(&user(id), user_level, NOW)
}
