//! Profile table contract.

use async_trait::async_trait;
use authframe_core::{Profile, ProfileError, ProfileUpdate, UserId};

/// CRUD access to the per-user `profiles` table, keyed by user ID.
#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    /// Profile row for `id`. `Ok(None)` if the row does not exist.
    ///
    /// A missing table is reported as [`ProfileError::TableMissing`].
    async fn get_by_id(&self, id: &UserId) -> Result<Option<Profile>, ProfileError>;

    /// Apply a partial update and stamp `updated_at`. Returns the updated row.
    async fn update(&self, id: &UserId, update: ProfileUpdate) -> Result<Profile, ProfileError>;

    /// Delete the row for `id`. Deleting a missing row is not an error.
    async fn delete(&self, id: &UserId) -> Result<(), ProfileError>;
}
