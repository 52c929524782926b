//! Auth-state change notifications.
//!
//! The provider pushes transitions that can originate outside any operation
//! the application is running (another tab, a deep link, its own token
//! auto-refresh timer). They are delivered through an [`AuthChangeFeed`] and
//! consumed through an [`AuthSubscription`].

use authframe_core::Session;
use tokio::sync::broadcast::{self, error::RecvError};

/// Buffered changes per subscriber before it starts skipping.
const FEED_CAPACITY: usize = 64;

/// Kind of auth-state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChangeKind {
    /// A sign-in completed.
    SignedIn,
    /// A sign-out completed.
    SignedOut,
    /// The session was silently refreshed.
    TokenRefreshed,
    /// Any other provider event, by wire name.
    Other(String),
}

impl AuthChangeKind {
    /// Parse a provider wire name (`SIGNED_IN`, `SIGNED_OUT`, ...).
    pub fn from_wire(name: &str) -> Self {
        match name {
            "SIGNED_IN" => Self::SignedIn,
            "SIGNED_OUT" => Self::SignedOut,
            "TOKEN_REFRESHED" => Self::TokenRefreshed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Provider wire name.
    pub fn as_wire(&self) -> &str {
        match self {
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::Other(name) => name,
        }
    }
}

/// A remote auth-state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    /// What happened.
    pub kind: AuthChangeKind,
    /// Session after the transition. `None` after a sign-out.
    pub session: Option<Session>,
}

impl AuthChange {
    /// A completed sign-in with the issued session.
    pub fn signed_in(session: Session) -> Self {
        Self { kind: AuthChangeKind::SignedIn, session: Some(session) }
    }

    /// A completed sign-out.
    pub fn signed_out() -> Self {
        Self { kind: AuthChangeKind::SignedOut, session: None }
    }

    /// A silent token refresh with the new session.
    pub fn token_refreshed(session: Session) -> Self {
        Self { kind: AuthChangeKind::TokenRefreshed, session: Some(session) }
    }
}

/// Broadcast source of [`AuthChange`]s.
///
/// Cheap to clone; all clones feed the same subscribers.
#[derive(Debug, Clone)]
pub struct AuthChangeFeed {
    sender: broadcast::Sender<AuthChange>,
}

impl AuthChangeFeed {
    /// Create a feed with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    /// Deliver a change to every current subscriber.
    pub fn emit(&self, change: AuthChange) {
        let kind = change.kind.as_wire().to_string();
        if self.sender.send(change).is_err() {
            tracing::trace!(%kind, "auth change emitted with no subscribers");
        }
    }

    /// Open a new subscription.
    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription { receiver: self.sender.subscribe() }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AuthChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellable subscription to an [`AuthChangeFeed`].
///
/// Dropping the subscription (or calling [`AuthSubscription::unsubscribe`])
/// detaches it from the feed.
#[derive(Debug)]
pub struct AuthSubscription {
    receiver: broadcast::Receiver<AuthChange>,
}

impl AuthSubscription {
    /// Next change in delivery order. `None` once the feed is gone.
    ///
    /// A subscriber that falls more than the feed capacity behind skips the
    /// changes it missed.
    pub async fn next(&mut self) -> Option<AuthChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "auth change subscriber lagged, skipping changes");
                },
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Detach from the feed.
    pub fn unsubscribe(self) {}
}
