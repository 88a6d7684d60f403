//! Chat domain models for the AI assistant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wanderlance_core::{ChatMessageId, ChatRole, UserId};

/// Maximum length of a client-chosen session id.
pub const MAX_SESSION_ID_LENGTH: usize = 128;

/// One turn of a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: ChatMessageId,
    /// Opaque id chosen by the client; groups messages into a conversation.
    pub session_id: String,
    /// Owner of the conversation.
    pub user_id: UserId,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a chat message.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub session_id: String,
    pub user_id: UserId,
    pub role: ChatRole,
    pub content: String,
}

impl NewChatMessage {
    /// Materialize the record with a fresh id.
    #[must_use]
    pub fn into_message(self, created_at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: ChatMessageId::generate(),
            session_id: self.session_id,
            user_id: self.user_id,
            role: self.role,
            content: self.content,
            created_at,
        }
    }
}

/// Whether a client-supplied session id is acceptable.
#[must_use]
pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LENGTH
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}
