//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] wanderlance_core::EmailError),

    /// Invalid username.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] wanderlance_core::UsernameError),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Profile field rejected.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// Invalid credentials (wrong password, unknown email, or no password set).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Current password did not match on a password change.
    #[error("current password is incorrect")]
    IncorrectPassword,

    /// Email already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Username already used by another account.
    #[error("username already taken")]
    UsernameTaken,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// No token was presented.
    #[error("missing token")]
    MissingToken,

    /// Token past its `exp`.
    #[error("token expired")]
    TokenExpired,

    /// Token malformed, badly signed, or naming a user that no longer exists.
    #[error("invalid token")]
    InvalidToken,

    /// Authenticated but not an admin.
    #[error("admin access required")]
    Forbidden,

    /// Token signing failed.
    #[error("token encoding error: {0}")]
    TokenEncoding(jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
