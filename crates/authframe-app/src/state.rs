//! Published authentication state.

use authframe_core::{Profile, Session, User, UserLevel, has_role};

/// Which top-level screen the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Spinner while the session is being resolved.
    Loading,
    /// Sign-in / registration flow.
    Auth,
    /// Signed-in application shell.
    Main,
}

/// Snapshot of the session lifecycle as seen by the rest of the application.
///
/// `user` is set iff `session` is set, and when both `user` and `profile` are
/// set they belong to the same user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    /// Signed-in identity. `None` when signed out.
    pub user: Option<User>,
    /// Application profile of `user`. May be `None` while signed in.
    pub profile: Option<Profile>,
    /// Active credentials. `None` when signed out.
    pub session: Option<Session>,
    /// True while an operation that changes the above is in flight.
    pub loading: bool,
}

impl AuthState {
    /// State before initialization: nothing known, loading.
    pub fn initial() -> Self {
        Self { user: None, profile: None, session: None, loading: true }
    }

    /// Whether a user is signed in.
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Screen selection for the root layout.
    pub fn screen(&self) -> Screen {
        if self.loading {
            Screen::Loading
        } else if self.user.is_some() {
            Screen::Main
        } else {
            Screen::Auth
        }
    }

    /// Level of the cached profile, if any.
    pub fn user_level(&self) -> Option<UserLevel> {
        self.profile.as_ref().map(|p| p.user_level)
    }

    /// Whether the cached profile grants at least `minimum`.
    pub fn has_role(&self, minimum: UserLevel) -> bool {
        has_role(self.profile.as_ref(), minimum)
    }

    pub(crate) fn clear(&mut self) {
        self.user = None;
        self.profile = None;
        self.session = None;
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initial()
    }
}
