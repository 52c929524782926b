//! Authentication client contract.

use async_trait::async_trait;
use authframe_core::{AuthError, Session, User, UserLevel};
use serde::{Deserialize, Serialize};

use crate::AuthSubscription;

/// User metadata attached at sign-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    /// Requested role, written to the provisioned profile row.
    pub user_level: UserLevel,
}

/// Result of a successful sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpResponse {
    /// The newly created user.
    pub user: User,
    /// Session for the new user. `None` when the provider requires email
    /// confirmation before the first sign-in.
    pub session: Option<Session>,
}

/// Hosted authentication operations.
///
/// Every method is a network round trip. Implementations report failures as
/// [`AuthError`] and never panic.
#[async_trait]
pub trait AuthClient: Send + Sync + 'static {
    /// Register a new account. Also provisions the user's profile row.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<SignUpResponse, AuthError>;

    /// Exchange credentials for a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Revoke the current session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Persisted session, if any. The session is returned as stored, even if
    /// expired; validating it is the caller's job.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Current identity record as the provider sees it now.
    async fn get_current_user(&self) -> Result<Option<User>, AuthError>;

    /// Exchange the stored refresh token for a new session.
    async fn refresh_session(&self) -> Result<Session, AuthError>;

    /// Send a password reset email.
    async fn reset_password_for_email(&self, email: &str) -> Result<(), AuthError>;

    /// Subscribe to auth-state changes.
    ///
    /// Changes that happen before the call are not replayed.
    fn on_auth_state_change(&self) -> AuthSubscription;
}
