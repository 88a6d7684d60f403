//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wanderlance_core::{Email, OAuthProvider, UserId, UserRole, Username};

/// A marketplace account.
///
/// Serialized form is the persisted record (the JSON store writes it
/// verbatim), so it carries the password hash. Never return it from a
/// handler; use [`CurrentUser`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: Username,
    /// Unique, lowercased.
    pub email: Email,
    /// Argon2 PHC string; absent for OAuth-only accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether any login method is attached to this account.
    #[must_use]
    pub const fn can_authenticate(&self) -> bool {
        self.password_hash.is_some() || self.google_id.is_some() || self.github_id.is_some()
    }

    /// The provider-side account id for `provider`, if linked.
    #[must_use]
    pub fn oauth_id(&self, provider: OAuthProvider) -> Option<&str> {
        match provider {
            OAuthProvider::Google => self.google_id.as_deref(),
            OAuthProvider::Github => self.github_id.as_deref(),
        }
    }
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Username,
    pub email: Email,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub github_id: Option<String>,
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
    pub role: UserRole,
    pub is_email_verified: bool,
}

impl NewUser {
    /// A local account with a password.
    #[must_use]
    pub const fn with_password(username: Username, email: Email, password_hash: String) -> Self {
        Self {
            username,
            email,
            password_hash: Some(password_hash),
            google_id: None,
            github_id: None,
            display_name: None,
            profile_picture: None,
            role: UserRole::User,
            is_email_verified: false,
        }
    }

    /// Materialize the record with a fresh id and timestamps.
    #[must_use]
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: UserId::generate(),
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            google_id: self.google_id,
            github_id: self.github_id,
            display_name: self.display_name,
            profile_picture: self.profile_picture,
            role: self.role,
            is_email_verified: self.is_email_verified,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Profile edits; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<Username>,
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
}

impl ProfileUpdate {
    /// Apply the edits to a user record.
    pub fn apply(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(display_name) = &self.display_name {
            user.display_name = Some(display_name.clone());
        }
        if let Some(picture) = &self.profile_picture {
            user.profile_picture = Some(picture.clone());
        }
    }
}

/// Public view of a user, safe to return to the browser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
    pub role: UserRole,
    pub is_email_verified: bool,
    pub has_password: bool,
    pub linked_providers: Vec<OAuthProvider>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        let linked_providers = OAuthProvider::ALL
            .into_iter()
            .filter(|p| user.oauth_id(*p).is_some())
            .collect();

        Self {
            id: user.id,
            username: user.username.to_string(),
            email: user.email.to_string(),
            display_name: user.display_name.clone(),
            profile_picture: user.profile_picture.clone(),
            role: user.role,
            is_email_verified: user.is_email_verified,
            has_password: user.password_hash.is_some(),
            linked_providers,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        NewUser::with_password(
            Username::parse("nomad").unwrap(),
            Email::parse("nomad@example.com").unwrap(),
            "$argon2id$hash".to_string(),
        )
        .into_user(Utc::now())
    }

    #[test]
    fn test_current_user_hides_password_hash() {
        let user = sample_user();
        let json = serde_json::to_string(&CurrentUser::from(&user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"hasPassword\":true"));
    }

    #[test]
    fn test_can_authenticate() {
        let mut user = sample_user();
        assert!(user.can_authenticate());

        user.password_hash = None;
        assert!(!user.can_authenticate());

        user.github_id = Some("42".to_string());
        assert!(user.can_authenticate());
        assert_eq!(
            CurrentUser::from(&user).linked_providers,
            vec![OAuthProvider::Github]
        );
    }

    #[test]
    fn test_profile_update_leaves_unset_fields() {
        let mut user = sample_user();
        user.display_name = Some("Old".to_string());

        ProfileUpdate {
            profile_picture: Some("https://cdn.example.com/p.png".to_string()),
            ..ProfileUpdate::default()
        }
        .apply(&mut user);

        assert_eq!(user.display_name.as_deref(), Some("Old"));
        assert_eq!(
            user.profile_picture.as_deref(),
            Some("https://cdn.example.com/p.png")
        );
    }
}
