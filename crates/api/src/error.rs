//! Unified error handling with Sentry integration.
//!
//! Every route handler returns `Result<T, AppError>`. The `IntoResponse`
//! impl is the single place where domain errors become status codes and
//! `{"error": "..."}` bodies; server-side failures are logged and captured
//! to Sentry, and their details never reach the client.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{AuthError, ChatError, OAuthError, TransactionError};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Chat operation failed.
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    /// Transaction operation failed.
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// OAuth flow failed outside the redirecting callback.
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

const INTERNAL: &str = "Internal server error";

impl AppError {
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Auth(
                    AuthError::Repository(_) | AuthError::PasswordHash | AuthError::TokenEncoding(_)
                )
                | Self::Chat(ChatError::Repository(_))
                | Self::Transaction(TransactionError::Repository(_))
                | Self::OAuth(OAuthError::Repository(_))
        )
    }

    fn status(&self) -> StatusCode {
        if self.is_server_error() {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }

        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_)
                | AuthError::InvalidUsername(_)
                | AuthError::WeakPassword(_)
                | AuthError::InvalidProfile(_)
                | AuthError::IncorrectPassword => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials
                | AuthError::MissingToken
                | AuthError::TokenExpired
                | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::Forbidden => StatusCode::FORBIDDEN,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists | AuthError::UsernameTaken => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Chat(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Transaction(err) => match err {
                TransactionError::Validation(_) | TransactionError::InvalidAmount(_) => {
                    StatusCode::BAD_REQUEST
                }
                TransactionError::NotFound => StatusCode::NOT_FOUND,
                TransactionError::Closed(_) | TransactionError::InvalidTransition { .. } => {
                    StatusCode::CONFLICT
                }
                TransactionError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::OAuth(err) => match err {
                OAuthError::ProviderDisabled(_) => StatusCode::NOT_FOUND,
                OAuthError::InvalidState
                | OAuthError::Denied(_)
                | OAuthError::MissingEmail
                | OAuthError::UnverifiedEmail => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Never includes internal details.
    fn public_message(&self) -> String {
        if self.is_server_error() {
            return INTERNAL.to_string();
        }

        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::InvalidUsername(e) => format!("Invalid username: {e}"),
                AuthError::WeakPassword(msg) | AuthError::InvalidProfile(msg) => capitalize(msg),
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::IncorrectPassword => "Current password is incorrect".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::UsernameTaken => "Username is already taken".to_string(),
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::MissingToken => "Authentication required".to_string(),
                AuthError::TokenExpired => "Token expired".to_string(),
                AuthError::InvalidToken => "Invalid token".to_string(),
                AuthError::Forbidden => "Admin access required".to_string(),
                _ => INTERNAL.to_string(),
            },
            Self::Chat(err) => err.to_string(),
            Self::Transaction(err) => match err {
                TransactionError::NotFound => "Transaction not found".to_string(),
                other => capitalize(&other.to_string()),
            },
            Self::OAuth(err) => match err {
                OAuthError::ProviderDisabled(_) => "Sign-in provider not available".to_string(),
                OAuthError::InvalidState => "Invalid or expired login attempt".to_string(),
                _ => "Sign-in failed".to_string(),
            },
            Self::NotFound(msg) | Self::BadRequest(msg) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => INTERNAL.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use wanderlance_core::TransactionStatus;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        (status, json["error"].as_str().unwrap_or_default().to_string())
    }

    #[tokio::test]
    async fn test_auth_error_mapping() {
        assert_eq!(
            render(AppError::Auth(AuthError::InvalidCredentials)).await,
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        );
        assert_eq!(
            render(AppError::Auth(AuthError::TokenExpired)).await,
            (StatusCode::UNAUTHORIZED, "Token expired".to_string())
        );
        assert_eq!(
            render(AppError::Auth(AuthError::Forbidden)).await,
            (StatusCode::FORBIDDEN, "Admin access required".to_string())
        );
        assert_eq!(
            render(AppError::Auth(AuthError::UserAlreadyExists)).await,
            (
                StatusCode::CONFLICT,
                "An account with this email already exists".to_string()
            )
        );
        assert_eq!(
            render(AppError::Auth(AuthError::WeakPassword(
                "password must be at least 8 characters".to_string()
            )))
            .await,
            (
                StatusCode::BAD_REQUEST,
                "Password must be at least 8 characters".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let (status, message) = render(AppError::Database(RepositoryError::DataCorruption(
            "users.role \"root\"".to_string(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, INTERNAL);

        let (status, message) = render(AppError::Auth(AuthError::Repository(
            RepositoryError::NotFound,
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, INTERNAL);
    }

    #[tokio::test]
    async fn test_transaction_and_chat_mapping() {
        let (status, message) = render(AppError::Transaction(
            TransactionError::InvalidTransition {
                from: TransactionStatus::Cancelled,
                to: TransactionStatus::Paid,
            },
        ))
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "Cannot change status from cancelled to paid");

        let (status, message) = render(AppError::Chat(ChatError::EmptyMessage)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Message is required");

        let (status, _) = render(AppError::Transaction(TransactionError::NotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("transaction".to_string());
        assert_eq!(err.to_string(), "Not found: transaction");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }
}
