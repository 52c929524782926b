//! Backend contracts
//!
//! The session store consumes two external collaborators through the traits in
//! this crate:
//!
//! - [`AuthClient`]: hosted authentication (sign up/in/out, session lookup and
//!   refresh, password reset) plus a push feed of auth-state changes
//! - [`ProfileStore`]: CRUD on the per-user `profiles` table
//!
//! # Components
//!
//! - [`AuthChange`] / [`AuthChangeKind`]: Remote auth-state transitions
//! - [`AuthChangeFeed`] / [`AuthSubscription`]: Broadcast feed and its
//!   cancellable subscription handle
//! - [`MemoryBackend`]: In-process backend implementing both traits
//! - [`ChaoticBackend`]: Wrapper that injects transport failures

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod chaotic;
mod event;
mod memory;
mod profile_store;

pub use auth::{AuthClient, SignUpMetadata, SignUpResponse};
pub use authframe_core::{
    AuthError, Profile, ProfileError, ProfileUpdate, Session, User, UserId, UserLevel,
    env::Environment,
};
pub use chaotic::ChaoticBackend;
pub use event::{AuthChange, AuthChangeFeed, AuthChangeKind, AuthSubscription};
pub use memory::{MemoryBackend, MemoryBackendConfig};
pub use profile_store::ProfileStore;
