//! Simulated environment.
//!
//! Monotonic time and sleeping go through `tokio::time`, so a test running
//! with a paused clock (`#[tokio::test(start_paused = true)]`) controls them.
//! The wall clock is a shared counter the test moves explicitly.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use authframe_core::env::Environment;

/// Environment with a manually driven wall clock.
///
/// Clones share the same clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    wall_clock: Arc<AtomicU64>,
}

impl SimEnv {
    /// Wall clock of a fresh environment (2023-11-14T22:13:20Z).
    pub const DEFAULT_EPOCH: u64 = 1_700_000_000;

    /// Environment starting at [`Self::DEFAULT_EPOCH`].
    pub fn new() -> Self {
        Self::at(Self::DEFAULT_EPOCH)
    }

    /// Environment starting at `secs` since the Unix epoch.
    pub fn at(secs: u64) -> Self {
        Self { wall_clock: Arc::new(AtomicU64::new(secs)) }
    }

    /// Move the wall clock forward.
    pub fn advance(&self, by: Duration) {
        self.wall_clock.fetch_add(by.as_secs(), Ordering::SeqCst);
    }

    /// Set the wall clock.
    pub fn set(&self, secs: u64) {
        self.wall_clock.store(secs, Ordering::SeqCst);
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn wall_clock_secs(&self) -> u64 {
        self.wall_clock.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
