//! Error types for the authentication and profile collaborators.
//!
//! These errors never cross the session store boundary as panics: the store
//! converts them into outcome values, or swallows them where the session must
//! survive (profile lookups).

use thiserror::Error;

use crate::UserId;

/// Errors reported by the authentication provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Request never got a response (offline, DNS, connection reset).
    #[error("{0}")]
    Network(String),

    /// Provider answered with an error status.
    #[error("provider error ({status}): {message}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// Message returned by the provider
        message: String,
    },

    /// Email/password pair did not match an account.
    #[error("invalid login credentials")]
    InvalidCredentials,

    /// Sign-up for an email that already has an account.
    #[error("user already registered")]
    AlreadyRegistered,

    /// Sign-in before the email address was confirmed.
    #[error("email not confirmed")]
    EmailNotConfirmed,

    /// Operation requires a session and none is stored.
    #[error("auth session missing")]
    SessionMissing,

    /// Operation on a session store that has been disposed.
    #[error("session store disposed")]
    Disposed,
}

impl AuthError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Network failures and provider 5xx responses are transient. Credential
    /// and session errors are not: retrying cannot change the answer.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Provider { status, .. } => *status >= 500,
            Self::InvalidCredentials
            | Self::AlreadyRegistered
            | Self::EmailNotConfirmed
            | Self::SessionMissing
            | Self::Disposed => false,
        }
    }
}

/// Errors reported by the profile store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// The profiles table has not been created.
    #[error("relation \"{table}\" does not exist")]
    TableMissing {
        /// Name of the missing table
        table: String,
    },

    /// No profile row for this user.
    #[error("profile {0} does not exist")]
    NotFound(UserId),

    /// Operation needs a signed-in user.
    #[error("no signed-in user")]
    NotSignedIn,

    /// Any other backend failure (network, constraint violation, ...).
    #[error("{0}")]
    Backend(String),
}

impl ProfileError {
    /// Whether the error means the resource is absent rather than broken.
    ///
    /// Backends that only expose a message are matched on the "does not
    /// exist" signal used by Postgres for missing relations.
    pub fn is_missing_resource(&self) -> bool {
        match self {
            Self::TableMissing { .. } | Self::NotFound(_) => true,
            Self::Backend(message) => message.contains("does not exist"),
            Self::NotSignedIn => false,
        }
    }
}
