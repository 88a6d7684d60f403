//! Authenticated chat route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use crate::ai::HistoryTurn;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::ChatMessage;
use crate::routes::ApiJson;
use crate::services::ChatService;
use crate::state::AppState;

/// A message in one of the caller's sessions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    /// Overrides the stored session as context when present.
    pub history: Option<Vec<HistoryTurn>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

/// Send a message and get the assistant's reply.
#[tracing::instrument(skip_all, fields(user_id = %user.id, session_id = %body.session_id))]
pub async fn send(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let response = ChatService::new(state.store(), state.ai())
        .send(user.id, &body.session_id, &body.message, body.history)
        .await?;

    Ok(Json(ChatResponse {
        response,
        session_id: body.session_id,
    }))
}

/// Messages of one of the caller's sessions, oldest first.
pub async fn session(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>> {
    let messages = ChatService::new(state.store(), state.ai())
        .session(user.id, &session_id)
        .await?;

    Ok(Json(SessionResponse {
        session_id,
        messages,
    }))
}

/// Delete one of the caller's sessions.
pub async fn clear_session(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(session_id): Path<String>,
) -> Result<Json<DeletedResponse>> {
    let deleted = ChatService::new(state.store(), state.ai())
        .clear_session(user.id, &session_id)
        .await?;

    Ok(Json(DeletedResponse { deleted }))
}
