//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from system time. Production code uses the real
//! monotonic and wall clocks, while tests drive a virtual wall clock and
//! Tokio's paused timer so that expiry checks and the startup watchdog are
//! reproducible.

use std::{future::Future, time::Duration};

/// Abstract environment providing time and async sleeping.
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `wall_clock_secs()` is seconds since the Unix epoch, the same unit the
///   authentication provider uses for `expires_at`
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use Tokio's pausable `tokio::time::Instant`.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// Only used for measuring elapsed durations, never compared against
    /// token expiry.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time in seconds since the Unix epoch.
    ///
    /// Session expiry is always evaluated against this value.
    fn wall_clock_secs(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by runtime code (watchdog timers), not by state machine logic.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}
