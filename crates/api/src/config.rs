//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `WANDERLANCE_HOST` - Bind address (default: 127.0.0.1)
//! - `WANDERLANCE_PORT` - Listen port (default: 5000)
//! - `WANDERLANCE_BASE_URL` - Public URL of this API, used for OAuth callbacks
//!   (default: `http://localhost:5000`)
//! - `CLIENT_URL` - SPA origin for CORS and post-login redirects
//!   (default: `http://localhost:3000`)
//! - `JWT_EXPIRY_HOURS` - Token lifetime, 1 to 8760 (default: 168)
//! - `COOKIE_SECURE` - Mark the token cookie `Secure` (default: false)
//! - `STORAGE_BACKEND` - `json` or `sqlite` (default: json)
//! - `DATA_FILE` - JSON store path (default: data/db.json)
//! - `DATABASE_URL` - `SQLite` connection string (required for sqlite backend)
//! - `GEMINI_API_KEY` - Generative AI key (chat answers with a fallback without it)
//! - `GEMINI_MODEL` - Model name (default: gemini-1.5-flash)
//! - `GEMINI_API_URL` - API base URL
//! - `AI_MAX_ATTEMPTS` - Attempts per chat turn (default: 3)
//! - `AI_BASE_DELAY_MS` - Backoff unit (default: 1000)
//! - `AI_TIMEOUT_SECS` - Per-request deadline (default: 30)
//! - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` - Google OAuth
//! - `GITHUB_CLIENT_ID` / `GITHUB_CLIENT_SECRET` - GitHub OAuth
//! - `SENTRY_DSN` / `SENTRY_ENVIRONMENT` - Sentry error tracking

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use wanderlance_core::OAuthProvider;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of this API
    pub base_url: String,
    /// Origin of the single-page frontend
    pub client_url: String,
    /// Token signing configuration
    pub jwt: JwtConfig,
    /// Whether the token cookie requires HTTPS
    pub cookie_secure: bool,
    /// Persistence backend
    pub storage: StorageConfig,
    /// Generative AI provider configuration
    pub ai: AiConfig,
    /// OAuth provider credentials
    pub oauth: OAuthConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Longest accepted token lifetime: one year.
pub const MAX_JWT_EXPIRY_HOURS: i64 = 24 * 365;

/// JWT signing configuration.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub expiry_hours: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("expiry_hours", &self.expiry_hours)
            .finish()
    }
}

/// Where records are persisted.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Single JSON document on disk (mock ORM).
    Json { path: PathBuf },
    /// `SQLite` database via sqlx.
    Sqlite { database_url: SecretString },
}

/// Generative AI provider configuration.
#[derive(Clone)]
pub struct AiConfig {
    /// API key; `None` disables outbound calls.
    pub api_key: Option<SecretString>,
    /// Model name, e.g. `gemini-1.5-flash`.
    pub model: String,
    /// API base URL.
    pub api_url: String,
    /// Total attempts per chat turn.
    pub max_attempts: u32,
    /// Backoff unit between attempts.
    pub base_delay: Duration,
    /// Deadline for a single request.
    pub timeout: Duration,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_owned(),
            api_url: DEFAULT_GEMINI_API_URL.to_owned(),
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(30),
        }
    }
}

/// OAuth client credentials for one provider.
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Credentials for every OAuth provider; a provider is enabled when present.
#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    pub google: Option<OAuthClientConfig>,
    pub github: Option<OAuthClientConfig>,
}

impl OAuthConfig {
    /// Credentials for a provider, if it is enabled.
    #[must_use]
    pub const fn provider(&self, provider: OAuthProvider) -> Option<&OAuthClientConfig> {
        match provider {
            OAuthProvider::Google => self.google.as_ref(),
            OAuthProvider::Github => self.github.as_ref(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the JWT secret fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("WANDERLANCE_HOST", "127.0.0.1")?;
        let port = parse_env("WANDERLANCE_PORT", "5000")?;
        let base_url = get_env_or_default("WANDERLANCE_BASE_URL", "http://localhost:5000");
        let client_url = get_env_or_default("CLIENT_URL", "http://localhost:3000");

        let secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&secret, "JWT_SECRET")?;
        let jwt = JwtConfig {
            secret,
            expiry_hours: validate_expiry_hours(parse_env("JWT_EXPIRY_HOURS", "168")?)?,
        };

        let cookie_secure = parse_env("COOKIE_SECURE", "false")?;
        let storage = StorageConfig::from_env()?;
        let ai = AiConfig::from_env()?;
        let oauth = OAuthConfig::from_env();

        Ok(Self {
            host,
            port,
            base_url: base_url.trim_end_matches('/').to_owned(),
            client_url: client_url.trim_end_matches('/').to_owned(),
            jwt,
            cookie_secure,
            storage,
            ai,
            oauth,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Local-development configuration with every optional setting at its default.
    #[must_use]
    pub fn local(jwt_secret: SecretString, storage: StorageConfig) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 5000,
            base_url: "http://localhost:5000".to_owned(),
            client_url: "http://localhost:3000".to_owned(),
            jwt: JwtConfig {
                secret: jwt_secret,
                expiry_hours: 168,
            },
            cookie_secure: false,
            storage,
            ai: AiConfig::default(),
            oauth: OAuthConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StorageConfig {
    /// Load the storage backend selection from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unknown backend or a missing `DATABASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        match get_env_or_default("STORAGE_BACKEND", "json").as_str() {
            "json" => Ok(Self::Json {
                path: PathBuf::from(get_env_or_default("DATA_FILE", "data/db.json")),
            }),
            "sqlite" => Ok(Self::Sqlite {
                database_url: get_required_secret("DATABASE_URL")?,
            }),
            other => Err(ConfigError::InvalidEnvVar(
                "STORAGE_BACKEND".to_string(),
                format!("expected 'json' or 'sqlite', got '{other}'"),
            )),
        }
    }
}

impl AiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_delay_ms: u64 = parse_env("AI_BASE_DELAY_MS", "1000")?;
        let timeout_secs: u64 = parse_env("AI_TIMEOUT_SECS", "30")?;
        let max_attempts: u32 = parse_env("AI_MAX_ATTEMPTS", "3")?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "AI_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            api_key: get_optional_env("GEMINI_API_KEY").map(SecretString::from),
            model: get_env_or_default("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            api_url: get_env_or_default("GEMINI_API_URL", DEFAULT_GEMINI_API_URL)
                .trim_end_matches('/')
                .to_owned(),
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl OAuthConfig {
    fn from_env() -> Self {
        Self {
            google: oauth_client_from_env("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            github: oauth_client_from_env("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Both halves of an OAuth credential pair, or nothing.
fn oauth_client_from_env(id_key: &str, secret_key: &str) -> Option<OAuthClientConfig> {
    let client_id = get_optional_env(id_key)?;
    let client_secret = get_optional_env(secret_key)?;
    Some(OAuthClientConfig {
        client_id,
        client_secret: SecretString::from(client_secret),
    })
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Token lifetime must be positive and at most [`MAX_JWT_EXPIRY_HOURS`].
fn validate_expiry_hours(hours: i64) -> Result<i64, ConfigError> {
    if (1..=MAX_JWT_EXPIRY_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(ConfigError::InvalidEnvVar(
            "JWT_EXPIRY_HOURS".to_string(),
            format!("must be between 1 and {MAX_JWT_EXPIRY_HOURS}, got {hours}"),
        ))
    }
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_expiry_hours() {
        assert_eq!(validate_expiry_hours(168).unwrap(), 168);
        assert_eq!(validate_expiry_hours(1).unwrap(), 1);
        assert_eq!(
            validate_expiry_hours(MAX_JWT_EXPIRY_HOURS).unwrap(),
            MAX_JWT_EXPIRY_HOURS
        );

        for bad in [0, -5, MAX_JWT_EXPIRY_HOURS + 1, 9_000_000_000_000_000] {
            let err = validate_expiry_hours(bad).unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidEnvVar(key, _) if key == "JWT_EXPIRY_HOURS"),
                "{err}"
            );
        }
    }

    #[test]
    fn test_longest_expiry_builds_issuer_and_cookie() {
        let config = JwtConfig {
            secret: SecretString::from("k3Jq9xV2mZ7pL4wR8tY1nB6cF0hD5sGa"),
            expiry_hours: MAX_JWT_EXPIRY_HOURS,
        };
        let _ = crate::services::auth::TokenIssuer::new(&config);
        assert_eq!(
            time::Duration::hours(config.expiry_hours).whole_days(),
            365
        );
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-secret-here", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "JWT_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "JWT_SECRET").is_err());
        assert!(validate_secret_length(&SecretString::from("x".repeat(32)), "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_local_config_socket_addr() {
        let config = ApiConfig::local(
            SecretString::from("x".repeat(32)),
            StorageConfig::Json {
                path: PathBuf::from("data/db.json"),
            },
        );

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5000);
        assert_eq!(config.ai.max_attempts, 3);
    }

    #[test]
    fn test_oauth_provider_lookup() {
        let config = OAuthConfig {
            google: Some(OAuthClientConfig {
                client_id: "google-id".to_string(),
                client_secret: SecretString::from("google-secret"),
            }),
            github: None,
        };

        assert!(config.provider(OAuthProvider::Google).is_some());
        assert!(config.provider(OAuthProvider::Github).is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let jwt = JwtConfig {
            secret: SecretString::from("super_secret_signing_key"),
            expiry_hours: 1,
        };
        let ai = AiConfig {
            api_key: Some(SecretString::from("super_secret_api_key")),
            ..AiConfig::default()
        };

        let output = format!("{jwt:?} {ai:?}");
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("super_secret_signing_key"));
        assert!(!output.contains("super_secret_api_key"));
    }
}
