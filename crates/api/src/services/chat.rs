//! Chat service for the AI travel assistant.
//!
//! Validates input, assembles history, calls the retrying generator, and
//! persists both sides of each turn.

use thiserror::Error;

use wanderlance_core::{ChatRole, UserId};

use crate::ai::{HistoryTurn, RetryingGenerator};
use crate::db::{RepositoryError, Store};
use crate::models::chat::{MAX_SESSION_ID_LENGTH, is_valid_session_id};
use crate::models::{ChatMessage, NewChatMessage};

/// Longest accepted user message, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Most recent turns forwarded to the provider.
pub const MAX_HISTORY_TURNS: usize = 20;

/// Errors from chat operations.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is required")]
    EmptyMessage,

    #[error("Message must be at most {MAX_MESSAGE_LENGTH} characters")]
    MessageTooLong,

    #[error("Session ID must be 1-{MAX_SESSION_ID_LENGTH} characters of letters, digits, '-', '_', '.', ':'")]
    InvalidSessionId,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Reject empty or oversized messages. Returns the trimmed message.
///
/// # Errors
///
/// Returns `ChatError::EmptyMessage` or `ChatError::MessageTooLong`.
pub fn validate_message(message: &str) -> Result<&str, ChatError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ChatError::MessageTooLong);
    }
    Ok(trimmed)
}

/// Keep only the most recent non-empty turns.
fn trim_history(history: Vec<HistoryTurn>) -> Vec<HistoryTurn> {
    let mut history: Vec<HistoryTurn> = history
        .into_iter()
        .filter(|turn| !turn.content.trim().is_empty())
        .collect();
    let excess = history.len().saturating_sub(MAX_HISTORY_TURNS);
    history.drain(..excess);
    history
}

/// Service for chat operations.
pub struct ChatService<'a> {
    store: &'a dyn Store,
    ai: &'a RetryingGenerator,
}

impl<'a> ChatService<'a> {
    /// Create a new chat service.
    #[must_use]
    pub const fn new(store: &'a dyn Store, ai: &'a RetryingGenerator) -> Self {
        Self { store, ai }
    }

    /// Send a message in one of the user's sessions and persist the turn.
    ///
    /// When `history` is `None`, the stored session is used as context.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or `ChatError::Repository`
    /// if the turn cannot be saved. Provider failures never surface here;
    /// they become a fallback reply.
    pub async fn send(
        &self,
        user_id: UserId,
        session_id: &str,
        message: &str,
        history: Option<Vec<HistoryTurn>>,
    ) -> Result<String, ChatError> {
        let message = validate_message(message)?;
        if !is_valid_session_id(session_id) {
            return Err(ChatError::InvalidSessionId);
        }

        let history = match history {
            Some(history) => history,
            None => self
                .store
                .session_messages(user_id, session_id)
                .await?
                .iter()
                .map(HistoryTurn::from)
                .collect(),
        };

        let response = self.ai.reply(message, &trim_history(history)).await;

        let turn = [
            (ChatRole::User, message),
            (ChatRole::Assistant, response.as_str()),
        ];
        for (role, content) in turn {
            self.store
                .append_message(NewChatMessage {
                    session_id: session_id.to_string(),
                    user_id,
                    role,
                    content: content.to_string(),
                })
                .await?;
        }

        tracing::debug!(user_id = %user_id, session_id, "Chat turn stored");
        Ok(response)
    }

    /// Anonymous one-off reply; nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or oversized message.
    pub async fn auto_reply(
        &self,
        message: &str,
        history: Vec<HistoryTurn>,
    ) -> Result<String, ChatError> {
        let message = validate_message(message)?;
        Ok(self.ai.reply(message, &trim_history(history)).await)
    }

    /// Messages in one of the user's sessions, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidSessionId` or `ChatError::Repository`.
    pub async fn session(
        &self,
        user_id: UserId,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        if !is_valid_session_id(session_id) {
            return Err(ChatError::InvalidSessionId);
        }
        Ok(self.store.session_messages(user_id, session_id).await?)
    }

    /// Delete one of the user's sessions. Returns the number of messages removed.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidSessionId` or `ChatError::Repository`.
    pub async fn clear_session(&self, user_id: UserId, session_id: &str) -> Result<u64, ChatError> {
        if !is_valid_session_id(session_id) {
            return Err(ChatError::InvalidSessionId);
        }
        let deleted = self.store.delete_session(user_id, session_id).await?;
        tracing::info!(user_id = %user_id, session_id, deleted, "Chat session cleared");
        Ok(deleted)
    }
}
