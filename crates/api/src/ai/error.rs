//! Error types for the generative-AI client.

use thiserror::Error;

/// Errors that can occur when calling the text-generation API.
#[derive(Debug, Error)]
pub enum AiError {
    /// No API key is configured.
    #[error("AI provider is not configured")]
    NotConfigured,

    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// Rate limited by the API (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The provider failed (HTTP 5xx).
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The provider rejected the request (other non-success statuses).
    #[error("API error ({status} {reason}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider status string, e.g. `INVALID_ARGUMENT`.
        reason: String,
        /// Error message.
        message: String,
    },

    /// The prompt or the answer was withheld by the provider's safety filters.
    #[error("response blocked: {0}")]
    Blocked(String),

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// How the retry loop should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Transient provider failure; back off linearly with the attempt number.
    Backoff,
    /// Client-side deadline hit; back off by a fixed multiple.
    AfterTimeout,
    /// Give up now.
    Never,
}

impl AiError {
    /// Classify this error for the retry loop.
    #[must_use]
    pub const fn retry(&self) -> Retry {
        match self {
            Self::RateLimited(_) | Self::Server { .. } => Retry::Backoff,
            Self::Timeout => Retry::AfterTimeout,
            _ => Retry::Never,
        }
    }

    /// Build an error from a non-success HTTP status and its body.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let (reason, message) = serde_json::from_str::<ApiErrorResponse>(body).map_or_else(
            |_| ("UNKNOWN".to_string(), body.to_string()),
            |r| (r.error.status, r.error.message),
        );

        match status {
            429 => Self::RateLimited(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Api {
                status,
                reason,
                message,
            },
        }
    }
}

/// Error envelope returned by the Generative Language API.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// Nested error details.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    /// Canonical status, e.g. `RESOURCE_EXHAUSTED`.
    #[serde(default)]
    pub status: String,
}
