//! Invariant checking for session lifecycle tests.
//!
//! Invariants are properties that must hold after every event the session
//! machine processes, whatever order the events arrive in.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = AuthSnapshot::new(machine.state().clone(), now_secs);
//! registry.check_all(&snapshot)?;
//! ```

mod checks;
mod snapshot;

pub use checks::{NoExpiredSession, ProfileBelongsToUser, UserMatchesSession};
pub use snapshot::AuthSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against an [`AuthSnapshot`].
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a snapshot.
    fn check(&self, snapshot: &AuthSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with the auth-state invariants.
    ///
    /// Includes:
    /// - [`UserMatchesSession`]: user is set iff session is, for the same user
    /// - [`ProfileBelongsToUser`]: a cached profile belongs to the user
    /// - [`NoExpiredSession`]: no held session is expired at snapshot time
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(UserMatchesSession);
        registry.add(ProfileBelongsToUser);
        registry.add(NoExpiredSession);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants, collecting every violation.
    pub fn check_all(&self, snapshot: &AuthSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(snapshot).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation found.
    #[allow(clippy::panic, reason = "test assertion helper")]
    pub fn assert_all(&self, snapshot: &AuthSnapshot, context: &str) {
        if let Err(violations) = self.check_all(snapshot) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
