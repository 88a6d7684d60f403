//! Google and GitHub sign-in route handlers.
//!
//! - Start: remember a one-time state and redirect to the consent page
//! - Callback: validate the state, resolve the account, set the session
//!   cookie, and hand the browser back to the SPA

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use wanderlance_core::OAuthProvider;

use crate::error::{AppError, Result, set_sentry_user};
use crate::routes::auth::session_cookie;
use crate::services::oauth::{self, OAuthError};
use crate::services::AuthService;
use crate::state::AppState;

/// Query parameters from the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange for tokens.
    pub code: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if authorization failed.
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
}

fn parse_provider(raw: &str) -> Result<OAuthProvider> {
    raw.parse()
        .map_err(|_| AppError::NotFound("Not found".to_string()))
}

fn login_error_url(state: &AppState, code: &str) -> String {
    format!(
        "{}/login?error={}",
        state.config().client_url.trim_end_matches('/'),
        urlencoding::encode(code)
    )
}

/// Redirect to the provider's consent page.
///
/// # Route
///
/// `GET /api/auth/{provider}`
pub async fn start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Redirect> {
    let provider = parse_provider(&provider)?;
    if !state.oauth().is_enabled(provider) {
        return Err(OAuthError::ProviderDisabled(provider).into());
    }

    let oauth_state = state.oauth_states().issue(provider).await;
    let url = state.oauth().authorization_url(provider, &oauth_state)?;

    tracing::debug!(%provider, "Redirecting to OAuth provider");
    Ok(Redirect::to(&url))
}

/// Handle the provider callback.
///
/// Failures never surface as JSON; the browser is sent to the SPA login
/// page with a short error code instead.
///
/// # Route
///
/// `GET /api/auth/{provider}/callback`
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<Response> {
    let provider = parse_provider(&provider)?;

    match complete_sign_in(&state, provider, query).await {
        Ok(token) => {
            let target = format!(
                "{}/auth/callback",
                state.config().client_url.trim_end_matches('/')
            );
            let jar = jar.add(session_cookie(state.config(), token));
            Ok((jar, Redirect::to(&target)).into_response())
        }
        Err(e) => {
            match &e {
                OAuthError::Repository(_) => {
                    tracing::error!(%provider, error = %e, "OAuth sign-in failed");
                }
                _ => tracing::warn!(%provider, error = %e, "OAuth sign-in failed"),
            }
            Ok(Redirect::to(&login_error_url(&state, e.code())).into_response())
        }
    }
}

async fn complete_sign_in(
    state: &AppState,
    provider: OAuthProvider,
    query: CallbackQuery,
) -> std::result::Result<String, OAuthError> {
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        return Err(OAuthError::Denied(format!("{error} {description}").trim().to_string()));
    }

    let returned_state = query.state.ok_or(OAuthError::InvalidState)?;
    state
        .oauth_states()
        .consume(&returned_state, provider)
        .await?;

    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| OAuthError::Denied("missing code".to_string()))?;

    let profile = state.oauth().fetch_profile(provider, &code).await?;
    let user = oauth::sign_in(state.store(), &profile).await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, %provider, "OAuth sign-in succeeded");

    AuthService::new(state.store(), state.tokens())
        .issue_token(&user)
        .map_err(|e| OAuthError::Exchange(e.to_string()))
}
