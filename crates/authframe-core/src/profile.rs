//! Application-owned profile records.

use serde::{Deserialize, Serialize};

use crate::{User, UserId, UserLevel};

/// Per-user extension record stored in the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same as the owning [`User`]'s ID.
    pub id: UserId,
    /// Email at registration time.
    pub email: String,
    /// Role of the user.
    pub user_level: UserLevel,
    /// Creation time in seconds since the Unix epoch.
    pub created_at_secs: u64,
    /// Last update time in seconds since the Unix epoch.
    pub updated_at_secs: u64,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Optional avatar reference (URL or storage key).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Profile row provisioned at sign-up.
    pub fn for_user(user: &User, user_level: UserLevel, now_secs: u64) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            user_level,
            created_at_secs: now_secs,
            updated_at_secs: now_secs,
            display_name: None,
            avatar_url: None,
        }
    }
}

/// Partial profile update.
///
/// `None` leaves a field untouched. For the optional display fields,
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    /// New email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New user level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_level: Option<UserLevel>,
    /// New display name, or `Some(None)` to clear it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Option<String>>,
    /// New avatar reference, or `Some(None)` to clear it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<Option<String>>,
}

impl ProfileUpdate {
    /// Update that only sets the display name.
    pub fn display_name(name: impl Into<String>) -> Self {
        Self { display_name: Some(Some(name.into())), ..Self::default() }
    }

    /// True if the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.user_level.is_none()
            && self.display_name.is_none()
            && self.avatar_url.is_none()
    }

    /// Apply the update to `profile` and stamp `updated_at_secs`.
    pub fn apply(&self, profile: &mut Profile, now_secs: u64) {
        if let Some(email) = &self.email {
            profile.email.clone_from(email);
        }
        if let Some(level) = self.user_level {
            profile.user_level = level;
        }
        if let Some(name) = &self.display_name {
            profile.display_name.clone_from(name);
        }
        if let Some(avatar) = &self.avatar_url {
            profile.avatar_url.clone_from(avatar);
        }
        profile.updated_at_secs = now_secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User { id: UserId::new("u1"), email: "a@b.com".into(), email_verified: true }
    }

    #[test]
    fn provisioned_profile_mirrors_user() {
        let profile = Profile::for_user(&user(), UserLevel::Manager, 100);

        assert_eq!(profile.id, UserId::new("u1"));
        assert_eq!(profile.email, "a@b.com");
        assert_eq!(profile.user_level, UserLevel::Manager);
        assert_eq!(profile.created_at_secs, profile.updated_at_secs);
    }

    #[test]
    fn update_touches_only_given_fields() {
        let mut profile = Profile::for_user(&user(), UserLevel::Creator, 100);
        profile.avatar_url = Some("avatars/u1.png".into());

        ProfileUpdate::display_name("Ada").apply(&mut profile, 200);

        assert_eq!(profile.display_name.as_deref(), Some("Ada"));
        assert_eq!(profile.avatar_url.as_deref(), Some("avatars/u1.png"));
        assert_eq!(profile.user_level, UserLevel::Creator);
        assert_eq!(profile.created_at_secs, 100);
        assert_eq!(profile.updated_at_secs, 200);
    }

    #[test]
    fn update_can_clear_optional_fields() {
        let mut profile = Profile::for_user(&user(), UserLevel::Creator, 100);
        profile.display_name = Some("Ada".into());

        let update = ProfileUpdate { display_name: Some(None), ..ProfileUpdate::default() };
        update.apply(&mut profile, 101);

        assert_eq!(profile.display_name, None);
    }

    #[test]
    fn empty_update() {
        assert!(ProfileUpdate::default().is_empty());
        assert!(!ProfileUpdate::display_name("x").is_empty());
    }
}
