//! Observable state captured for invariant checks.

use authframe_app::AuthState;

/// Auth state at a point in time.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    /// Published state.
    pub state: AuthState,
    /// Wall clock when the snapshot was taken, seconds since the Unix epoch.
    pub now_secs: u64,
}

impl AuthSnapshot {
    /// Capture `state` at `now_secs`.
    pub fn new(state: AuthState, now_secs: u64) -> Self {
        Self { state, now_secs }
    }
}
