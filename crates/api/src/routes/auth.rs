//! Local account route handlers.
//!
//! Registration, login/logout, and self-service account upkeep. Tokens are
//! returned in the body and, on login, also set as an `HttpOnly` cookie.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{AUTH_COOKIE, RequireAuth};
use crate::models::CurrentUser;
use crate::routes::ApiJson;
use crate::services::AuthService;
use crate::services::auth::ProfileInput;
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Profile edit body; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
}

/// Password change body. `currentPassword` may be omitted by OAuth-only
/// accounts setting their first password.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest {
    pub current_password: Option<String>,
    pub new_password: String,
}

/// Token plus the public user view.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: CurrentUser,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// =============================================================================
// Cookie helpers
// =============================================================================

/// Build the session cookie for `token`.
#[must_use]
pub fn session_cookie(config: &ApiConfig, token: String) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(config.jwt.expiry_hours))
        .build()
}

fn expired_cookie(config: &ApiConfig) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a local account.
#[tracing::instrument(skip_all, fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let auth = AuthService::new(state.store(), state.tokens());
    let (user, token) = auth
        .register(&body.username, &body.email, &body.password)
        .await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: CurrentUser::from(&user),
        }),
    ))
}

/// Log in with email and password.
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let auth = AuthService::new(state.store(), state.tokens());
    let (user, token) = auth.login(&body.email, &body.password).await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));

    let jar = jar.add(session_cookie(state.config(), token.clone()));
    Ok((
        jar,
        Json(AuthResponse {
            token,
            user: CurrentUser::from(&user),
        }),
    ))
}

/// Clear the session cookie. Always succeeds.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    clear_sentry_user();

    let jar = jar.add(expired_cookie(state.config()));
    (
        jar,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

/// The authenticated user.
pub async fn me(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
    Json(CurrentUser::from(&user))
}

/// Update username, display name, or profile picture.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ProfileRequest>,
) -> Result<Json<CurrentUser>> {
    let auth = AuthService::new(state.store(), state.tokens());
    let updated = auth
        .update_profile(
            &user,
            ProfileInput {
                username: body.username,
                display_name: body.display_name,
                profile_picture: body.profile_picture,
            },
        )
        .await?;

    Ok(Json(CurrentUser::from(&updated)))
}

/// Change (or set) the account password.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<PasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let auth = AuthService::new(state.store(), state.tokens());
    auth.change_password(&user, body.current_password.as_deref(), &body.new_password)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password updated".to_string(),
    }))
}

/// Delete the account and its chat history, and clear the cookie.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn delete_account(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let auth = AuthService::new(state.store(), state.tokens());
    auth.delete_account(user.id).await?;

    clear_sentry_user();
    let jar = jar.add(expired_cookie(state.config()));
    Ok((StatusCode::NO_CONTENT, jar))
}
