//! Google and GitHub sign-in (authorization-code flow).
//!
//! # Flow
//!
//! 1. `GET /api/auth/{provider}` issues a random state, remembers it for ten
//!    minutes, and redirects to the provider's consent page.
//! 2. The provider redirects back to `/api/auth/{provider}/callback` with a
//!    `code` and the `state`.
//! 3. The state is consumed (one use only), the code is exchanged for an
//!    access token, and the profile is fetched.
//! 4. [`sign_in`] finds the user by provider id, else by email (linking the
//!    provider), else creates a passwordless account.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use moka::future::Cache;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use wanderlance_core::{Email, OAuthProvider, UserRole, Username};

use crate::config::{OAuthClientConfig, OAuthConfig};
use crate::db::{RepositoryError, Store};
use crate::models::{NewUser, User};

/// How long an issued state stays valid.
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Length of the random state parameter.
pub const STATE_LENGTH: usize = 32;

const MAX_USERNAME_SUFFIX: u32 = 9_999;

const USER_AGENT: &str = concat!("wanderlance-api/", env!("CARGO_PKG_VERSION"));

/// Errors from the OAuth flow. Each maps to a short code passed back to the
/// SPA as `/login?error=<code>`.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Provider has no client id/secret configured.
    #[error("{0} sign-in is not configured")]
    ProviderDisabled(OAuthProvider),

    /// State missing, expired, reused, or issued for another provider.
    #[error("invalid or expired OAuth state")]
    InvalidState,

    /// The user declined consent or the provider reported an error.
    #[error("provider returned an error: {0}")]
    Denied(String),

    /// Code exchange failed.
    #[error("token exchange failed: {0}")]
    Exchange(String),

    /// Profile fetch failed or returned something unusable.
    #[error("profile fetch failed: {0}")]
    Profile(String),

    /// The provider did not share a usable email address.
    #[error("provider did not return an email address")]
    MissingEmail,

    /// The profile's email matches an existing account but the provider
    /// has not verified it, so it cannot be linked.
    #[error("provider email is not verified")]
    UnverifiedEmail,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl OAuthError {
    /// Short machine-readable code for the login page.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ProviderDisabled(_) => "provider_disabled",
            Self::InvalidState => "invalid_state",
            Self::Denied(_) => "access_denied",
            Self::MissingEmail => "email_required",
            Self::UnverifiedEmail => "email_unverified",
            Self::Exchange(_) | Self::Profile(_) | Self::Http(_) => "oauth_failed",
            Self::Repository(_) => "server_error",
        }
    }
}

// =============================================================================
// State Cache
// =============================================================================

/// Outstanding OAuth states, each valid for one callback within [`STATE_TTL`].
#[derive(Clone)]
pub struct OAuthStateStore {
    states: Cache<String, (OAuthProvider, Instant)>,
    ttl: Duration,
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new(STATE_TTL)
    }
}

impl OAuthStateStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            states: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(ttl)
                .build(),
            ttl,
        }
    }

    /// Issue and remember a new state for `provider`.
    pub async fn issue(&self, provider: OAuthProvider) -> String {
        let state = generate_random_string(STATE_LENGTH);
        self.states
            .insert(state.clone(), (provider, Instant::now()))
            .await;
        state
    }

    /// Consume `state`. Succeeds once, and only for the provider it was
    /// issued for.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::InvalidState` otherwise.
    pub async fn consume(&self, state: &str, provider: OAuthProvider) -> Result<(), OAuthError> {
        // Eviction is lazy, so check the age as well.
        match self.states.remove(state).await {
            Some((issued_for, issued_at))
                if issued_for == provider && issued_at.elapsed() < self.ttl =>
            {
                Ok(())
            }
            _ => Err(OAuthError::InvalidState),
        }
    }
}

/// Generate a cryptographically secure random string.
fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .filter_map(|_| CHARSET.get(rng.random_range(0..CHARSET.len())))
        .map(|&b| char::from(b))
        .collect()
}

// =============================================================================
// Provider Client
// =============================================================================

/// Endpoints for one provider.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    /// GitHub only: list of the account's addresses, used when the profile
    /// hides the email.
    pub emails_url: Option<String>,
    pub scope: &'static str,
}

impl ProviderEndpoints {
    #[must_use]
    pub fn for_provider(provider: OAuthProvider) -> Self {
        match provider {
            OAuthProvider::Google => Self {
                authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                profile_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
                emails_url: None,
                scope: "openid email profile",
            },
            OAuthProvider::Github => Self {
                authorize_url: "https://github.com/login/oauth/authorize".to_string(),
                token_url: "https://github.com/login/oauth/access_token".to_string(),
                profile_url: "https://api.github.com/user".to_string(),
                emails_url: Some("https://api.github.com/user/emails".to_string()),
                scope: "read:user user:email",
            },
        }
    }
}

/// What we keep from a provider's profile response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider: OAuthProvider,
    /// The account id within the provider.
    pub provider_user_id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    /// Preferred handle (GitHub login), used to derive a username.
    pub login: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

impl From<GoogleUserInfo> for OAuthProfile {
    fn from(info: GoogleUserInfo) -> Self {
        Self {
            provider: OAuthProvider::Google,
            provider_user_id: info.sub,
            email: info.email,
            email_verified: info.email_verified,
            login: None,
            display_name: info.name,
            avatar_url: info.picture,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

impl From<GithubUser> for OAuthProfile {
    fn from(user: GithubUser) -> Self {
        Self {
            provider: OAuthProvider::Github,
            provider_user_id: user.id.to_string(),
            email: user.email,
            email_verified: false,
            login: Some(user.login),
            display_name: user.name,
            avatar_url: user.avatar_url,
        }
    }
}

/// Pick the primary verified address, else any verified one.
fn pick_github_email(emails: &[GithubEmail]) -> Option<&GithubEmail> {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
}

/// Performs the authorization-code flow against Google and GitHub.
#[derive(Clone)]
pub struct OAuthClient {
    inner: Arc<OAuthClientInner>,
}

struct OAuthClientInner {
    http: reqwest::Client,
    config: OAuthConfig,
    callback_base: String,
}

impl OAuthClient {
    /// Create a client. Callbacks are registered under `base_url`.
    #[must_use]
    pub fn new(http: reqwest::Client, config: OAuthConfig, base_url: &str) -> Self {
        Self {
            inner: Arc::new(OAuthClientInner {
                http,
                config,
                callback_base: base_url.trim_end_matches('/').to_string(),
            }),
        }
    }

    /// Whether `provider` has credentials configured.
    #[must_use]
    pub fn is_enabled(&self, provider: OAuthProvider) -> bool {
        self.inner.config.provider(provider).is_some()
    }

    fn credentials(&self, provider: OAuthProvider) -> Result<&OAuthClientConfig, OAuthError> {
        self.inner
            .config
            .provider(provider)
            .ok_or(OAuthError::ProviderDisabled(provider))
    }

    /// The callback URL registered with the provider.
    #[must_use]
    pub fn redirect_uri(&self, provider: OAuthProvider) -> String {
        format!("{}/api/auth/{provider}/callback", self.inner.callback_base)
    }

    /// Build the consent-page URL.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::ProviderDisabled` if the provider is not configured.
    pub fn authorization_url(
        &self,
        provider: OAuthProvider,
        state: &str,
    ) -> Result<String, OAuthError> {
        let credentials = self.credentials(provider)?;
        let endpoints = ProviderEndpoints::for_provider(provider);

        Ok(format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            endpoints.authorize_url,
            urlencoding::encode(&credentials.client_id),
            urlencoding::encode(&self.redirect_uri(provider)),
            urlencoding::encode(endpoints.scope),
            urlencoding::encode(state)
        ))
    }

    /// Exchange `code` for an access token and fetch the profile.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Exchange` or `OAuthError::Profile` if either
    /// request fails.
    #[instrument(skip(self, code), fields(provider = %provider))]
    pub async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<OAuthProfile, OAuthError> {
        let endpoints = ProviderEndpoints::for_provider(provider);
        let access_token = self.exchange_code(provider, &endpoints, code).await?;

        match provider {
            OAuthProvider::Google => {
                let info: GoogleUserInfo = self.get_json(&endpoints.profile_url, &access_token).await?;
                Ok(info.into())
            }
            OAuthProvider::Github => {
                let user: GithubUser = self.get_json(&endpoints.profile_url, &access_token).await?;
                let mut profile = OAuthProfile::from(user);

                if let Some(emails_url) = &endpoints.emails_url {
                    let emails: Vec<GithubEmail> = self.get_json(emails_url, &access_token).await?;
                    if let Some(chosen) = pick_github_email(&emails) {
                        profile.email = Some(chosen.email.clone());
                        profile.email_verified = true;
                    }
                }

                Ok(profile)
            }
        }
    }

    async fn exchange_code(
        &self,
        provider: OAuthProvider,
        endpoints: &ProviderEndpoints,
        code: &str,
    ) -> Result<String, OAuthError> {
        let credentials = self.credentials(provider)?;
        let redirect_uri = self.redirect_uri(provider);

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", credentials.client_id.as_str()),
            (
                "client_secret",
                secrecy::ExposeSecret::expose_secret(&credentials.client_secret),
            ),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let response = self
            .inner
            .http
            .post(&endpoints.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(OAuthError::Exchange(format!("{status}: {text}")));
        }

        let token: TokenResponse = response.json().await?;
        match (token.access_token, token.error) {
            (Some(access_token), None) => Ok(access_token),
            (_, Some(error)) => Err(OAuthError::Exchange(
                token.error_description.unwrap_or(error),
            )),
            (None, None) => Err(OAuthError::Exchange("no access token".to_string())),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, OAuthError> {
        let response = self
            .inner
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::Profile(format!("{url}: {}", response.status())));
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::Profile(format!("{url}: {e}")))
    }
}

// =============================================================================
// Account Linking
// =============================================================================

/// Resolve a provider profile to a local account, creating one if needed,
/// and record the login.
///
/// # Errors
///
/// Returns `OAuthError::MissingEmail` if the profile matches no account and
/// carries no valid email, `OAuthError::UnverifiedEmail` if its email
/// belongs to an existing account but is unverified, or
/// `OAuthError::Repository` on storage failure.
pub async fn sign_in(store: &dyn Store, profile: &OAuthProfile) -> Result<User, OAuthError> {
    let mut user = match store
        .find_user_by_oauth_id(profile.provider, &profile.provider_user_id)
        .await?
    {
        Some(user) => user,
        None => {
            let email = profile
                .email
                .as_deref()
                .and_then(|e| Email::parse(e).ok())
                .ok_or(OAuthError::MissingEmail)?;

            match store.find_user_by_email(&email).await? {
                Some(existing) if !profile.email_verified => {
                    tracing::warn!(
                        user_id = %existing.id,
                        provider = %profile.provider,
                        "Refusing to link OAuth profile with unverified email"
                    );
                    return Err(OAuthError::UnverifiedEmail);
                }
                Some(mut existing) => {
                    link_provider(&mut existing, profile);
                    tracing::info!(
                        user_id = %existing.id,
                        provider = %profile.provider,
                        "Linked OAuth provider to existing account"
                    );
                    existing
                }
                None => create_oauth_user(store, profile, email).await?,
            }
        }
    };

    if user.profile_picture.is_none() {
        user.profile_picture.clone_from(&profile.avatar_url);
    }
    user.last_login = Some(Utc::now());

    Ok(store.update_user(&user).await?)
}

fn link_provider(user: &mut User, profile: &OAuthProfile) {
    let id = Some(profile.provider_user_id.clone());
    match profile.provider {
        OAuthProvider::Google => user.google_id = id,
        OAuthProvider::Github => user.github_id = id,
    }
    user.is_email_verified = true;
}

async fn create_oauth_user(
    store: &dyn Store,
    profile: &OAuthProfile,
    email: Email,
) -> Result<User, OAuthError> {
    let base = Username::sanitize(profile.login.as_deref().unwrap_or_else(|| email.local_part()));
    let username = unique_username(store, &base).await?;

    let (google_id, github_id) = match profile.provider {
        OAuthProvider::Google => (Some(profile.provider_user_id.clone()), None),
        OAuthProvider::Github => (None, Some(profile.provider_user_id.clone())),
    };

    let user = store
        .create_user(NewUser {
            username,
            email,
            password_hash: None,
            google_id,
            github_id,
            display_name: profile.display_name.clone(),
            profile_picture: profile.avatar_url.clone(),
            role: UserRole::User,
            is_email_verified: profile.email_verified,
        })
        .await?;

    tracing::info!(user_id = %user.id, provider = %profile.provider, "Created account via OAuth");
    Ok(user)
}

/// `base`, or `base` with the smallest free numeric suffix.
async fn unique_username(store: &dyn Store, base: &Username) -> Result<Username, OAuthError> {
    if !store.username_taken(base).await? {
        return Ok(base.clone());
    }

    for n in 1..=MAX_USERNAME_SUFFIX {
        let candidate = base.with_suffix(n);
        if !store.username_taken(&candidate).await? {
            return Ok(candidate);
        }
    }

    Ok(base.with_suffix(rand::rng().random_range(10_000..100_000_000)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::db::{JsonStore, UserStore};

    fn github_profile(id: &str, email: Option<&str>) -> OAuthProfile {
        OAuthProfile {
            provider: OAuthProvider::Github,
            provider_user_id: id.to_string(),
            email: email.map(str::to_string),
            email_verified: email.is_some(),
            login: Some("octo cat".to_string()),
            display_name: Some("Octo Cat".to_string()),
            avatar_url: Some("https://avatars.example.com/1".to_string()),
        }
    }

    async fn store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("db.json")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_state_is_single_use_and_provider_bound() {
        let states = OAuthStateStore::default();

        let state = states.issue(OAuthProvider::Google).await;
        assert_eq!(state.len(), STATE_LENGTH);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));

        assert!(states.consume(&state, OAuthProvider::Google).await.is_ok());
        assert!(matches!(
            states.consume(&state, OAuthProvider::Google).await,
            Err(OAuthError::InvalidState)
        ));

        let other = states.issue(OAuthProvider::Google).await;
        assert!(states.consume(&other, OAuthProvider::Github).await.is_err());
        assert!(states.consume("made-up", OAuthProvider::Google).await.is_err());
    }

    #[tokio::test]
    async fn test_state_expires() {
        let states = OAuthStateStore::new(Duration::from_millis(20));
        let state = states.issue(OAuthProvider::Github).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(states.consume(&state, OAuthProvider::Github).await.is_err());
    }

    #[test]
    fn test_authorization_url() {
        let client = OAuthClient::new(
            reqwest::Client::new(),
            OAuthConfig {
                google: Some(OAuthClientConfig {
                    client_id: "abc.apps.googleusercontent.com".to_string(),
                    client_secret: SecretString::from("s".to_string()),
                }),
                github: None,
            },
            "http://localhost:5000/",
        );

        let url = client
            .authorization_url(OAuthProvider::Google, "xyz")
            .unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=abc.apps.googleusercontent.com"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A5000%2Fapi%2Fauth%2Fgoogle%2Fcallback"
        ));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("state=xyz"));

        assert!(matches!(
            client.authorization_url(OAuthProvider::Github, "xyz"),
            Err(OAuthError::ProviderDisabled(OAuthProvider::Github))
        ));
    }

    #[test]
    fn test_profile_parsing() {
        let google: GoogleUserInfo = serde_json::from_str(
            r#"{"sub":"1099","email":"ana@example.com","email_verified":true,"name":"Ana","picture":"https://p/a.png"}"#,
        )
        .unwrap();
        let profile = OAuthProfile::from(google);
        assert_eq!(profile.provider_user_id, "1099");
        assert!(profile.email_verified);

        let github: GithubUser = serde_json::from_str(
            r#"{"id":583231,"login":"octocat","name":null,"email":null,"avatar_url":"https://a/1"}"#,
        )
        .unwrap();
        let profile = OAuthProfile::from(github);
        assert_eq!(profile.provider_user_id, "583231");
        assert_eq!(profile.login.as_deref(), Some("octocat"));

        let emails = vec![
            GithubEmail {
                email: "old@example.com".to_string(),
                primary: false,
                verified: true,
            },
            GithubEmail {
                email: "main@example.com".to_string(),
                primary: true,
                verified: true,
            },
        ];
        assert_eq!(
            pick_github_email(&emails).map(|e| e.email.as_str()),
            Some("main@example.com")
        );
    }

    #[tokio::test]
    async fn test_sign_in_creates_then_reuses_account() {
        let (_dir, store) = store().await;
        let profile = github_profile("42", Some("octo@example.com"));

        let created = sign_in(&store, &profile).await.unwrap();
        assert_eq!(created.github_id.as_deref(), Some("42"));
        assert_eq!(created.username.as_str(), "octo_cat");
        assert!(created.password_hash.is_none());
        assert!(created.is_email_verified);
        assert!(created.last_login.is_some());

        let again = sign_in(&store, &github_profile("42", None)).await.unwrap();
        assert_eq!(again.id, created.id);
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_links_existing_email() {
        let (_dir, store) = store().await;
        let existing = store
            .create_user(NewUser::with_password(
                Username::parse("ana").unwrap(),
                Email::parse("ana@example.com").unwrap(),
                "$argon2id$x".to_string(),
            ))
            .await
            .unwrap();

        let profile = OAuthProfile {
            provider: OAuthProvider::Google,
            provider_user_id: "g-7".to_string(),
            email: Some("ANA@example.com".to_string()),
            email_verified: true,
            login: None,
            display_name: None,
            avatar_url: None,
        };
        let linked = sign_in(&store, &profile).await.unwrap();

        assert_eq!(linked.id, existing.id);
        assert_eq!(linked.google_id.as_deref(), Some("g-7"));
        assert!(linked.password_hash.is_some());
        assert!(linked.is_email_verified);
    }

    #[tokio::test]
    async fn test_sign_in_refuses_unverified_email_of_existing_account() {
        let (_dir, store) = store().await;
        let existing = store
            .create_user(NewUser::with_password(
                Username::parse("ana").unwrap(),
                Email::parse("ana@example.com").unwrap(),
                "$argon2id$x".to_string(),
            ))
            .await
            .unwrap();

        let profile = OAuthProfile {
            provider: OAuthProvider::Google,
            provider_user_id: "someone-else".to_string(),
            email: Some("ana@example.com".to_string()),
            email_verified: false,
            login: None,
            display_name: None,
            avatar_url: None,
        };
        let err = sign_in(&store, &profile).await.unwrap_err();
        assert!(matches!(err, OAuthError::UnverifiedEmail));
        assert_eq!(err.code(), "email_unverified");

        let untouched = store.find_user_by_id(existing.id).await.unwrap().unwrap();
        assert!(untouched.google_id.is_none());
        assert!(untouched.last_login.is_none());
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_dedupes_usernames_and_requires_email() {
        let (_dir, store) = store().await;

        let first = sign_in(&store, &github_profile("1", Some("a@example.com")))
            .await
            .unwrap();
        let second = sign_in(&store, &github_profile("2", Some("b@example.com")))
            .await
            .unwrap();
        assert_eq!(first.username.as_str(), "octo_cat");
        assert_eq!(second.username.as_str(), "octo_cat1");

        assert!(matches!(
            sign_in(&store, &github_profile("3", None)).await,
            Err(OAuthError::MissingEmail)
        ));
    }
}
