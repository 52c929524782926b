//! Core types for Authframe
//!
//! Plain data and pure functions shared by every layer of the session
//! lifecycle: the credential bundle ([`Session`]), the identity record
//! ([`User`]), the application-owned [`Profile`], the ordered [`UserLevel`]
//! role enum, and the error types surfaced by the backend collaborators.
//!
//! # Components
//!
//! - [`env::Environment`]: Clock abstraction (monotonic time, wall clock,
//!   sleeping) so expiry checks and the startup watchdog run on virtual time in
//!   tests
//! - [`Session`] / [`SessionValidity`]: Expiry and refresh-window rules
//! - [`UserLevel`] / [`has_role`] / [`AccessPolicy`]: Role checks
//! - [`AuthError`] / [`ProfileError`]: Typed backend failures

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod profile;
pub mod role;
pub mod session;

pub use env::Environment;
pub use error::{AuthError, ProfileError};
pub use profile::{Profile, ProfileUpdate};
pub use role::{AccessPolicy, ParseUserLevelError, UserLevel, has_role};
pub use session::{Session, SessionValidity, User, UserId};
