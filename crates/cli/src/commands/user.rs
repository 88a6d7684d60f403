//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a local account
//! wl-cli user create -e ana@example.com -u ana -p 'correct horse battery'
//!
//! # Create an admin directly
//! wl-cli user create -e ops@example.com -u ops -p '...' -r admin
//!
//! # Promote an existing account
//! wl-cli user promote -e ana@example.com
//! ```
//!
//! Acts on whichever store `STORAGE_BACKEND` selects.

use thiserror::Error;

use wanderlance_api::db::{RepositoryError, Store};
use wanderlance_api::models::{NewUser, User};
use wanderlance_api::services::AuthError;
use wanderlance_api::services::auth::password::{hash_password, validate_password};
use wanderlance_core::{Email, EmailError, UserRole, Username, UsernameError};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserCommandError {
    #[error("Invalid role: {0}. Valid roles: user, admin")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("Invalid password: {0}")]
    InvalidPassword(AuthError),

    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error("No user with email: {0}")]
    UserNotFound(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Create a local account.
///
/// # Errors
///
/// Returns an error if any field is invalid or the email is already taken.
pub async fn create(
    store: &dyn Store,
    email: &str,
    username: &str,
    password: &str,
    role: &str,
) -> Result<User, UserCommandError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| UserCommandError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email)?;
    let username = Username::parse(username)?;
    validate_password(password).map_err(UserCommandError::InvalidPassword)?;
    let password_hash = hash_password(password).map_err(UserCommandError::InvalidPassword)?;

    let mut new_user = NewUser::with_password(username, email.clone(), password_hash);
    new_user.role = role;

    let user = store.create_user(new_user).await.map_err(|e| match e {
        RepositoryError::Conflict(_) => UserCommandError::UserExists(email.to_string()),
        other => UserCommandError::Repository(other),
    })?;

    tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "User created");
    Ok(user)
}

/// Give an existing account the admin role.
///
/// # Errors
///
/// Returns an error if no account has this email.
pub async fn promote(store: &dyn Store, email: &str) -> Result<User, UserCommandError> {
    let email = Email::parse(email)?;
    let mut user = store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| UserCommandError::UserNotFound(email.to_string()))?;

    if user.role.is_admin() {
        tracing::info!(user_id = %user.id, "User is already an admin");
        return Ok(user);
    }

    user.role = UserRole::Admin;
    let user = store.update_user(&user).await?;

    tracing::info!(user_id = %user.id, email = %user.email, "User promoted to admin");
    Ok(user)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wanderlance_api::db::JsonStore;

    use super::*;

    #[tokio::test]
    async fn test_create_and_promote() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("db.json")).await.unwrap();

        let user = create(&store, "Ana@Example.com", "ana", "long enough pw", "user")
            .await
            .unwrap();
        assert_eq!(user.email.as_str(), "ana@example.com");
        assert_eq!(user.role, UserRole::User);

        let promoted = promote(&store, "ana@example.com").await.unwrap();
        assert!(promoted.role.is_admin());
        assert_eq!(promoted.id, user.id);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("db.json")).await.unwrap();

        assert!(matches!(
            create(&store, "a@b.co", "ana", "long enough pw", "root").await,
            Err(UserCommandError::InvalidRole(_))
        ));
        assert!(matches!(
            create(&store, "a@b.co", "ana", "short", "user").await,
            Err(UserCommandError::InvalidPassword(_))
        ));

        create(&store, "a@b.co", "ana", "long enough pw", "user")
            .await
            .unwrap();
        assert!(matches!(
            create(&store, "a@b.co", "other", "long enough pw", "user").await,
            Err(UserCommandError::UserExists(_))
        ));
        assert!(matches!(
            promote(&store, "nobody@b.co").await,
            Err(UserCommandError::UserNotFound(_))
        ));
    }
}
