//! Results of imperative session operations.

use authframe_core::AuthError;

/// Message shown after a sign-up that needs email confirmation.
pub const REGISTRATION_CONFIRMATION_MESSAGE: &str =
    "Registration successful! Please check your email to verify your account.";

/// Message shown after a password reset request.
pub const PASSWORD_RESET_MESSAGE: &str = "Password reset email sent! Please check your inbox.";

/// Result of a [`crate::SessionStore`] operation.
///
/// Operations never return `Err`; callers check `success`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Failure cause, set iff `success` is false.
    pub error: Option<AuthError>,
    /// Message for the user.
    pub message: Option<String>,
    /// Sign-up succeeded but the account must be confirmed by email first.
    pub confirmation_required: bool,
}

impl Outcome {
    /// Successful operation without a message.
    pub fn ok() -> Self {
        Self { success: true, error: None, message: None, confirmation_required: false }
    }

    /// Successful operation with a message for the user.
    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self { message: Some(message.into()), ..Self::ok() }
    }

    /// Failed operation.
    pub fn failed(error: AuthError) -> Self {
        Self { success: false, error: Some(error), message: None, confirmation_required: false }
    }

    /// Sign-up accepted, pending email confirmation.
    pub fn confirmation_required() -> Self {
        Self {
            confirmation_required: true,
            ..Self::ok_with_message(REGISTRATION_CONFIRMATION_MESSAGE)
        }
    }

    /// Failure message for display. `None` on success.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

impl From<Result<(), AuthError>> for Outcome {
    fn from(result: Result<(), AuthError>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::failed(e),
        }
    }
}
