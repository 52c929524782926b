//! Chaotic backend wrapper for fault injection testing
//!
//! Wraps any backend and randomly fails calls with transport errors, so the
//! session store's recovery paths (loading always clears, failed refresh keeps
//! the session on transient errors) can be exercised under load.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use authframe_core::{AuthError, Profile, ProfileError, ProfileUpdate, Session, User, UserId};

use crate::{AuthClient, AuthSubscription, ProfileStore, SignUpMetadata, SignUpResponse};

const INJECTED_FAILURE: &str = "chaotic failure injection";

/// Backend wrapper that randomly injects failures.
///
/// Delegates to the wrapped backend but fails each call with probability
/// `failure_rate`. Auth calls fail with [`AuthError::Network`], profile calls
/// with [`ProfileError::Backend`]. Subscribing to auth changes never fails.
#[derive(Clone)]
pub struct ChaoticBackend<B> {
    inner: B,
    /// 0.0 never fails, 1.0 always fails
    failure_rate: f64,
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<AtomicUsize>,
}

/// Linear congruential generator, so a seed reproduces a failure sequence.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    #[allow(clippy::cast_precision_loss, reason = "state is below 2^32")]
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<B> ChaoticBackend<B> {
    /// Wrap `inner` with the default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: B, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    #[allow(clippy::panic, reason = "invalid rate is a test setup bug")]
    pub fn with_seed(inner: B, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wrapped backend, for inspecting state after chaos.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Calls attempted through the wrapper, failed or not.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    /// Count the call and roll for failure.
    fn roll(&self) -> bool {
        self.operation_count.fetch_add(1, Ordering::Relaxed);
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.next() < self.failure_rate
    }

    fn auth_fault(&self, op: &'static str) -> Result<(), AuthError> {
        if self.roll() {
            tracing::debug!(op, "injecting auth failure");
            return Err(AuthError::Network(INJECTED_FAILURE.to_string()));
        }
        Ok(())
    }

    fn profile_fault(&self, op: &'static str) -> Result<(), ProfileError> {
        if self.roll() {
            tracing::debug!(op, "injecting profile failure");
            return Err(ProfileError::Backend(INJECTED_FAILURE.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl<B: AuthClient> AuthClient for ChaoticBackend<B> {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<SignUpResponse, AuthError> {
        self.auth_fault("sign_up")?;
        self.inner.sign_up(email, password, metadata).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.auth_fault("sign_in")?;
        self.inner.sign_in(email, password).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.auth_fault("sign_out")?;
        self.inner.sign_out().await
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        self.auth_fault("get_session")?;
        self.inner.get_session().await
    }

    async fn get_current_user(&self) -> Result<Option<User>, AuthError> {
        self.auth_fault("get_current_user")?;
        self.inner.get_current_user().await
    }

    async fn refresh_session(&self) -> Result<Session, AuthError> {
        self.auth_fault("refresh_session")?;
        self.inner.refresh_session().await
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<(), AuthError> {
        self.auth_fault("reset_password_for_email")?;
        self.inner.reset_password_for_email(email).await
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.inner.on_auth_state_change()
    }
}

#[async_trait]
impl<B: ProfileStore> ProfileStore for ChaoticBackend<B> {
    async fn get_by_id(&self, id: &UserId) -> Result<Option<Profile>, ProfileError> {
        self.profile_fault("get_by_id")?;
        self.inner.get_by_id(id).await
    }

    async fn update(&self, id: &UserId, update: ProfileUpdate) -> Result<Profile, ProfileError> {
        self.profile_fault("update")?;
        self.inner.update(id, update).await
    }

    async fn delete(&self, id: &UserId) -> Result<(), ProfileError> {
        self.profile_fault("delete")?;
        self.inner.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthChangeFeed;

    /// Backend that always succeeds with no session.
    struct Quiet {
        feed: AuthChangeFeed,
    }

    #[async_trait]
    impl AuthClient for Quiet {
        async fn sign_up(
            &self,
            _email: &str,
            _password: &str,
            _metadata: SignUpMetadata,
        ) -> Result<SignUpResponse, AuthError> {
            Err(AuthError::AlreadyRegistered)
        }

        async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session, AuthError> {
            Err(AuthError::InvalidCredentials)
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            Ok(())
        }

        async fn get_session(&self) -> Result<Option<Session>, AuthError> {
            Ok(None)
        }

        async fn get_current_user(&self) -> Result<Option<User>, AuthError> {
            Ok(None)
        }

        async fn refresh_session(&self) -> Result<Session, AuthError> {
            Err(AuthError::SessionMissing)
        }

        async fn reset_password_for_email(&self, _email: &str) -> Result<(), AuthError> {
            Ok(())
        }

        fn on_auth_state_change(&self) -> AuthSubscription {
            self.feed.subscribe()
        }
    }

    fn quiet() -> Quiet {
        Quiet { feed: AuthChangeFeed::new() }
    }

    #[tokio::test]
    async fn zero_rate_never_fails() {
        let chaotic = ChaoticBackend::new(quiet(), 0.0);
        for _ in 0..100 {
            assert_eq!(chaotic.get_session().await, Ok(None));
        }
        assert_eq!(chaotic.operation_count(), 100);
    }

    #[tokio::test]
    async fn full_rate_always_fails_with_network_error() {
        let chaotic = ChaoticBackend::new(quiet(), 1.0);
        for _ in 0..20 {
            let err = chaotic.sign_out().await.unwrap_err();
            assert!(err.is_transient());
        }
    }

    #[tokio::test]
    async fn same_seed_reproduces_failures() {
        let a = ChaoticBackend::with_seed(quiet(), 0.5, 42);
        let b = ChaoticBackend::with_seed(quiet(), 0.5, 42);

        for _ in 0..50 {
            assert_eq!(a.get_session().await.is_err(), b.get_session().await.is_err());
        }
    }

    #[tokio::test]
    async fn subscriptions_bypass_chaos() {
        let chaotic = ChaoticBackend::new(quiet(), 1.0);
        let _sub = chaotic.on_auth_state_change();
        assert_eq!(chaotic.inner().feed.subscriber_count(), 1);
        assert_eq!(chaotic.operation_count(), 0);
    }

    #[test]
    #[should_panic(expected = "failure_rate must be between")]
    fn rejects_out_of_range_rate() {
        let _ = ChaoticBackend::new(quiet(), 1.5);
    }
}
