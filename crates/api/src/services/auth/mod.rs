//! Authentication service.
//!
//! Local email/password accounts, JWT session tokens, and account
//! maintenance. OAuth sign-in lives in [`crate::services::oauth`] and
//! reuses [`AuthService::issue_token`].

mod error;
pub mod jwt;
pub mod password;

pub use error::AuthError;
pub use jwt::{Claims, TokenIssuer};

use chrono::Utc;

use wanderlance_core::{Email, UserId, UserRole, Username};

use crate::db::{RepositoryError, Store};
use crate::models::{NewUser, ProfileUpdate, User};

use password::{hash_password, validate_password, verify_password};

/// Longest accepted display name, in characters.
pub const MAX_DISPLAY_NAME_LENGTH: usize = 100;

/// Raw profile edits as submitted by the client.
#[derive(Debug, Clone, Default)]
pub struct ProfileInput {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
}

/// Authentication service.
///
/// Handles registration, login, token verification, and account upkeep.
pub struct AuthService<'a> {
    store: &'a dyn Store,
    tokens: &'a TokenIssuer,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a dyn Store, tokens: &'a TokenIssuer) -> Self {
        Self { store, tokens }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new user with username, email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::InvalidUsername` or
    /// `AuthError::WeakPassword` if validation fails, and
    /// `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(User, String), AuthError> {
        let username = Username::parse(username)?;
        let email = Email::parse(email)?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;

        let user = self
            .store
            .create_user(NewUser::with_password(username, email, password_hash))
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");

        let token = self.tokens.issue(&user)?;
        Ok((user, token))
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown, the
    /// account has no password, or the password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let mut user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, hash)?;

        user.last_login = Some(Utc::now());
        let user = self.store.update_user(&user).await?;

        tracing::info!(user_id = %user.id, "User logged in");

        let token = self.tokens.issue(&user)?;
        Ok((user, token))
    }

    /// Issue a session token for an already-authenticated user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenEncoding` if signing fails.
    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        self.tokens.issue(user)
    }

    /// Verify a token and load the user it names.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExpired` or `AuthError::InvalidToken` if the
    /// token is rejected or its user no longer exists.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.tokens.verify(token)?;
        let user_id = claims.user_id()?;

        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    // =========================================================================
    // Account Maintenance
    // =========================================================================

    /// Change (or, for OAuth-only accounts, set) the password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IncorrectPassword` if the account has a password
    /// and `current` does not match it, or `AuthError::WeakPassword` if the
    /// new password fails validation.
    pub async fn change_password(
        &self,
        user: &User,
        current: Option<&str>,
        new_password: &str,
    ) -> Result<User, AuthError> {
        if let Some(existing) = user.password_hash.as_deref() {
            let current = current.ok_or(AuthError::IncorrectPassword)?;
            verify_password(current, existing).map_err(|_| AuthError::IncorrectPassword)?;
        }

        validate_password(new_password)?;

        let mut updated = user.clone();
        updated.password_hash = Some(hash_password(new_password)?);
        let updated = self.store.update_user(&updated).await?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(updated)
    }

    /// Update username, display name and/or profile picture.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` or `AuthError::InvalidProfile` if
    /// a field is rejected, and `AuthError::UsernameTaken` if another account
    /// already uses the requested username.
    pub async fn update_profile(
        &self,
        user: &User,
        input: ProfileInput,
    ) -> Result<User, AuthError> {
        let update = self.validate_profile(user, input).await?;

        let mut updated = user.clone();
        update.apply(&mut updated);
        Ok(self.store.update_user(&updated).await?)
    }

    async fn validate_profile(
        &self,
        user: &User,
        input: ProfileInput,
    ) -> Result<ProfileUpdate, AuthError> {
        let username = match input.username {
            Some(raw) => {
                let username = Username::parse(&raw)?;
                if username != user.username && self.store.username_taken(&username).await? {
                    return Err(AuthError::UsernameTaken);
                }
                Some(username)
            }
            None => None,
        };

        let display_name = input
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        if let Some(name) = &display_name
            && name.chars().count() > MAX_DISPLAY_NAME_LENGTH
        {
            return Err(AuthError::InvalidProfile(format!(
                "display name must be at most {MAX_DISPLAY_NAME_LENGTH} characters"
            )));
        }

        let profile_picture = input
            .profile_picture
            .map(|picture| picture.trim().to_string())
            .filter(|picture| !picture.is_empty());
        if let Some(picture) = &profile_picture {
            validate_picture_url(picture)?;
        }

        Ok(ProfileUpdate {
            username,
            display_name,
            profile_picture,
        })
    }

    /// Delete the account and its chat history.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user is already gone.
    pub async fn delete_account(&self, user_id: UserId) -> Result<(), AuthError> {
        let messages = self.store.delete_user_messages(user_id).await?;

        if !self.store.delete_user(user_id).await? {
            return Err(AuthError::UserNotFound);
        }

        tracing::info!(user_id = %user_id, messages, "Account deleted");
        Ok(())
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// All accounts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store cannot be read.
    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.store.list_users().await?)
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no user has this ID.
    pub async fn set_role(&self, user_id: UserId, role: UserRole) -> Result<User, AuthError> {
        let mut user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.role == role {
            return Ok(user);
        }

        user.role = role;
        let user = self.store.update_user(&user).await?;

        tracing::info!(user_id = %user.id, role = %role, "Role changed");
        Ok(user)
    }
}

fn validate_picture_url(raw: &str) -> Result<(), AuthError> {
    let parsed = url::Url::parse(raw)
        .map_err(|_| AuthError::InvalidProfile("profile picture must be a URL".to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AuthError::InvalidProfile(
            "profile picture must be an http(s) URL".to_string(),
        ));
    }

    Ok(())
}
