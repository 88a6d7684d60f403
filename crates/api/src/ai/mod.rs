//! Generative-AI integration for the travel assistant.
//!
//! [`GeminiClient`] talks to the Google Generative Language API;
//! [`RetryingGenerator`] wraps any [`TextGenerator`] with a bounded retry
//! loop and canned fallbacks, so chat handlers never see provider errors.
//!
//! # Example
//!
//! ```rust,ignore
//! let generator = generator_from_config(&config.ai)?;
//! let chat = RetryingGenerator::from_config(generator, &config.ai);
//! let reply = chat.reply("Best month for Patagonia?", &[]).await;
//! ```

pub mod client;
pub mod error;
pub mod retry;
pub mod types;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use wanderlance_core::ChatRole;

use crate::models::ChatMessage;

pub use client::{GeminiClient, UnconfiguredGenerator, generator_from_config};
pub use error::AiError;
pub use retry::{RetryPolicy, RetryingGenerator};

/// A prior turn sent along with a new message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: ChatRole,
    pub content: String,
}

impl HistoryTurn {
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Role name in Gemini's vocabulary.
    #[must_use]
    pub const fn gemini_role(&self) -> &'static str {
        match self.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "model",
        }
    }
}

impl From<&ChatMessage> for HistoryTurn {
    fn from(message: &ChatMessage) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// A single-shot text generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier reported by the status endpoint.
    fn model(&self) -> &str;

    /// Whether calls can succeed at all.
    fn is_configured(&self) -> bool;

    /// Generate a reply to `message` given the prior turns.
    ///
    /// # Errors
    ///
    /// Returns an `AiError` describing why no text was produced.
    async fn generate(&self, message: &str, history: &[HistoryTurn]) -> Result<String, AiError>;
}
