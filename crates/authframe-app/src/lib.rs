//! Application layer for Authframe
//!
//! Pure session state machine and the async store that drives it against the
//! backend collaborators. The same machine runs under production time and
//! under the virtual clocks of the test harness.
//!
//! # Components
//!
//! - [`SessionMachine`]: Sans-IO lifecycle machine ([`SessionEvent`] in,
//!   [`SessionAction`] out) that owns the [`AuthState`]
//! - [`SessionStore`]: Async runtime that executes actions against an
//!   [`AuthClient`](authframe_client::AuthClient) and a
//!   [`ProfileStore`](authframe_client::ProfileStore), runs the startup
//!   watchdog and the remote event listener, and publishes state changes
//! - [`SessionConfig`]: Watchdog, refresh window and role defaults
//! - [`SystemEnv`]: Production clock

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod config;
mod event;
mod machine;
mod outcome;
mod state;
mod store;
mod system_env;

pub use action::{LogLevel, SessionAction};
pub use config::{ConfigError, SessionConfig};
pub use event::{ProfilePurpose, SessionEvent};
pub use machine::{Phase, SessionMachine};
pub use outcome::{Outcome, PASSWORD_RESET_MESSAGE, REGISTRATION_CONFIRMATION_MESSAGE};
pub use state::{AuthState, Screen};
pub use store::SessionStore;
pub use system_env::SystemEnv;
