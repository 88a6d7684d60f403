//! Authentication extractors.
//!
//! The session token is a JWT sent either as `Authorization: Bearer <token>`
//! or in the `token` cookie set at login. The header wins when both are
//! present.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

/// Name of the cookie carrying the session token.
pub const AUTH_COOKIE: &str = "token";

/// Pull the raw token out of the request, if any.
#[must_use]
pub fn bearer_or_cookie_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(&parts.headers)
        .get(AUTH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Extractor that requires a valid session token.
///
/// Rejects with 401 "Authentication required" when no token is sent,
/// "Token expired" or "Invalid token" when it does not verify.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
///     Json(CurrentUser::from(&user))
/// }
/// ```
pub struct RequireAuth(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_or_cookie_token(parts).ok_or(AuthError::MissingToken)?;

        let user = AuthService::new(state.store(), state.tokens())
            .authenticate(&token)
            .await?;

        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(Self(user))
    }
}

/// Extractor that requires an authenticated admin.
///
/// Authenticated non-admins get 403 "Admin access required".
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if !user.role.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Admin route refused");
            return Err(AuthError::Forbidden.into());
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_header() {
        let parts = parts(Request::builder().header(AUTHORIZATION, "Bearer abc.def.ghi"));
        assert_eq!(bearer_or_cookie_token(&parts).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_cookie_fallback() {
        let parts = parts(Request::builder().header("cookie", "theme=dark; token=xyz"));
        assert_eq!(bearer_or_cookie_token(&parts).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_header_wins_over_cookie() {
        let parts = parts(
            Request::builder()
                .header(AUTHORIZATION, "Bearer from-header")
                .header("cookie", "token=from-cookie"),
        );
        assert_eq!(bearer_or_cookie_token(&parts).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_missing_or_malformed() {
        assert!(bearer_or_cookie_token(&parts(Request::builder())).is_none());

        let basic = parts(Request::builder().header(AUTHORIZATION, "Basic dXNlcjpwYXNz"));
        assert!(bearer_or_cookie_token(&basic).is_none());

        let empty = parts(Request::builder().header(AUTHORIZATION, "Bearer   "));
        assert!(bearer_or_cookie_token(&empty).is_none());
    }
}
