//! Bounded retry around the text generator.
//!
//! Callers always get a string back: the generated reply, or a canned
//! message when the provider keeps failing or rejects the request.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AiConfig;

use super::error::{AiError, Retry};
use super::{HistoryTurn, TextGenerator};

pub const QUOTA_FALLBACK: &str =
    "Our AI assistant has reached its usage limit for now. Please try again later.";
pub const INVALID_FALLBACK: &str =
    "Sorry, I couldn't process that request. Could you rephrase your message?";
pub const BLOCKED_FALLBACK: &str =
    "Sorry, I can't help with that request. Please try asking something else.";
pub const GENERIC_FALLBACK: &str =
    "Sorry, I'm having trouble responding right now. Please try again in a moment.";
pub const BUSY_FALLBACK: &str =
    "Our AI assistant is very busy right now. Please try again in a few moments.";

/// Attempt budget and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1`, or `None` to stop.
    #[must_use]
    pub fn delay_after(&self, attempt: u32, retry: Retry) -> Option<Duration> {
        match retry {
            Retry::Backoff => Some(self.base_delay.saturating_mul(attempt)),
            Retry::AfterTimeout => Some(self.base_delay.saturating_mul(2)),
            Retry::Never => None,
        }
    }
}

/// Canned reply for a non-retryable error, chosen from its message.
#[must_use]
pub fn fallback_for(error: &AiError) -> &'static str {
    let message = error.to_string().to_lowercase();

    if message.contains("quota") {
        QUOTA_FALLBACK
    } else if message.contains("invalid") {
        INVALID_FALLBACK
    } else if message.contains("blocked") {
        BLOCKED_FALLBACK
    } else {
        GENERIC_FALLBACK
    }
}

/// A [`TextGenerator`] wrapped in a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryingGenerator {
    generator: Arc<dyn TextGenerator>,
    policy: RetryPolicy,
}

impl RetryingGenerator {
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    /// Wrap `generator` with the attempt budget and base delay from `config`.
    #[must_use]
    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &AiConfig) -> Self {
        Self::new(
            generator,
            RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                base_delay: config.base_delay,
            },
        )
    }

    /// The wrapped generator.
    #[must_use]
    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Generate a reply. Never fails.
    pub async fn reply(&self, message: &str, history: &[HistoryTurn]) -> String {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let error = match self.generator.generate(message, history).await {
                Ok(text) => return text,
                Err(e) => e,
            };

            let Some(delay) = self.policy.delay_after(attempt, error.retry()) else {
                tracing::error!(attempt, error = %error, "AI request failed, not retrying");
                return fallback_for(&error).to_string();
            };

            if attempt == max_attempts {
                tracing::error!(attempt, error = %error, "AI request failed, attempts exhausted");
                break;
            }

            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "AI request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }

        BUSY_FALLBACK.to_string()
    }
}
