//! Anonymous travel-assistant endpoint used by the landing page widget.
//!
//! Nothing is stored; the client keeps its own history.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::ai::HistoryTurn;
use crate::error::Result;
use crate::routes::ApiJson;
use crate::services::ChatService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AutoChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AutoChatResponse {
    pub response: String,
}

/// Whether the provider is configured, and which model answers.
#[derive(Debug, Serialize, Deserialize)]
pub struct AutoChatStatus {
    pub configured: bool,
    pub model: String,
}

/// One stateless reply.
pub async fn reply(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AutoChatRequest>,
) -> Result<Json<AutoChatResponse>> {
    let response = ChatService::new(state.store(), state.ai())
        .auto_reply(&body.message, body.history)
        .await?;

    Ok(Json(AutoChatResponse { response }))
}

pub async fn status(State(state): State<AppState>) -> Json<AutoChatStatus> {
    let generator = state.ai().generator();
    Json(AutoChatStatus {
        configured: generator.is_configured(),
        model: generator.model().to_string(),
    })
}
