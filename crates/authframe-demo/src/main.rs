//! Authframe demo binary.
//!
//! Runs one full session lifecycle against the in-memory backend and logs
//! every state change the store publishes.
//!
//! # Usage
//!
//! ```bash
//! # Sign up, sign in and sign out as a manager
//! authframe-demo --email ada@example.com --level manager
//!
//! # Exercise the email confirmation path with verbose logging
//! authframe-demo --require-confirmation --log-level debug
//! ```

use std::time::Duration;

use authframe_app::{AuthState, Outcome, SessionConfig, SessionStore, SystemEnv};
use authframe_client::{AuthClient, MemoryBackend, MemoryBackendConfig, ProfileStore};
use authframe_core::{AccessPolicy, ProfileUpdate, UserLevel};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Authframe session lifecycle demo
#[derive(Parser, Debug)]
#[command(name = "authframe-demo")]
#[command(about = "Drive a session store through sign-up, sign-in and sign-out")]
#[command(version)]
struct Args {
    /// Email to register
    #[arg(short, long, default_value = "demo@example.com")]
    email: String,

    /// Password to register with
    #[arg(short, long, default_value = "correct horse")]
    password: String,

    /// Requested user level (creator, manager, executive, admin)
    #[arg(long, default_value = "creator")]
    level: UserLevel,

    /// Display name written to the profile after sign-in
    #[arg(long, default_value = "Demo User")]
    display_name: String,

    /// Seconds before a stalled initialization is abandoned
    #[arg(long, default_value = "10")]
    watchdog_secs: u64,

    /// Emails always treated as administrators
    #[arg(long)]
    admin_email: Vec<String>,

    /// Withhold the session at sign-up until the email is confirmed
    #[arg(long)]
    require_confirmation: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = SessionConfig {
        watchdog_timeout_secs: args.watchdog_secs,
        access: AccessPolicy::with_admin_emails(args.admin_email.iter().cloned()),
        ..SessionConfig::default()
    };

    let env = SystemEnv::new();
    let backend = MemoryBackend::new(
        env,
        MemoryBackendConfig {
            require_email_confirmation: args.require_confirmation,
            ..MemoryBackendConfig::default()
        },
    );
    let store = SessionStore::new(backend.clone(), backend.clone(), env, config)?;

    let observer = tokio::spawn(observe(store.watch()));

    store.start();
    wait_until(&store, |state| !state.loading).await?;
    tracing::info!(screen = ?store.state().screen(), "Initialization finished");

    let outcome = store.sign_up_as(&args.email, &args.password, args.level).await;
    check("sign up", &outcome)?;
    if outcome.confirmation_required {
        tracing::info!(notice = outcome.message.as_deref(), "Confirming email out of band");
        backend.confirm_email(&args.email);
        check("sign in", &store.sign_in(&args.email, &args.password).await)?;
    }
    wait_until(&store, |state| state.is_signed_in() && !state.loading).await?;

    let state = store.state();
    tracing::info!(
        email = state.user.as_ref().map(|u| u.email.as_str()),
        level = ?state.user_level(),
        manager = store.has_role(UserLevel::Manager),
        admin = store.is_admin(),
        "Signed in"
    );

    store.ensure_fresh().await;

    match store.update_profile(ProfileUpdate::display_name(args.display_name)).await {
        Ok(profile) => {
            tracing::info!(display_name = profile.display_name.as_deref(), "Profile updated");
        },
        Err(err) => tracing::warn!("Profile update failed: {err}"),
    }

    check("reload user", &store.reload_user().await)?;

    let outcome = store.reset_password(&args.email).await;
    check("password reset", &outcome)?;
    tracing::info!(notice = outcome.message.as_deref(), "Password reset requested");

    check("sign out", &store.sign_out().await)?;
    tracing::info!(screen = ?store.state().screen(), "Signed out");

    store.dispose();
    observer.abort();

    Ok(())
}

/// Wait until a published state satisfies `ready`, giving up after a while.
async fn wait_until<A, P>(
    store: &SessionStore<A, P, SystemEnv>,
    ready: impl FnMut(&AuthState) -> bool,
) -> Result<(), watch::error::RecvError>
where
    A: AuthClient,
    P: ProfileStore,
{
    let mut rx = store.watch();
    match tokio::time::timeout(Duration::from_secs(30), rx.wait_for(ready)).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => {
            tracing::warn!("Gave up waiting for the session store");
            Ok(())
        },
    }
}

/// Log every published state.
async fn observe(mut rx: watch::Receiver<AuthState>) {
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        tracing::debug!(
            screen = ?state.screen(),
            loading = state.loading,
            user = state.user.as_ref().map(|u| u.email.as_str()),
            "State published"
        );
    }
}

fn check(op: &str, outcome: &Outcome) -> Result<(), Box<dyn std::error::Error>> {
    match &outcome.error {
        Some(err) => {
            tracing::error!("{op} failed: {err}");
            Err(err.clone().into())
        },
        None => Ok(()),
    }
}
