//! Deterministic test harness for Authframe.
//!
//! Scripted implementations of the backend traits and a virtual wall clock,
//! so session lifecycle tests control every response and every second.
//!
//! # Scripted Collaborators
//!
//! [`ScriptedAuthClient`] answers each call with a configured [`Reply`]:
//! ready, delayed on the Tokio clock, or hanging forever. It records call
//! counts and pushes auth changes the way a real provider would.
//! [`ScriptedProfileStore`] holds profile rows and can be switched into a
//! failing mode.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks [`AuthSnapshot`]s against properties that
//! must hold after every event. Use [`InvariantRegistry::standard()`] for the
//! auth-state invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod invariants;
pub mod scripted;
pub mod sim_env;

pub use invariants::{
    AuthSnapshot, Invariant, InvariantRegistry, InvariantResult, NoExpiredSession,
    ProfileBelongsToUser, UserMatchesSession, Violation,
};
pub use scripted::{Reply, ScriptedAuthClient, ScriptedProfileStore};
pub use sim_env::SimEnv;
