use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::json;
use tracing::warn;

use super::{ApiResponse, bad_json, dispatch_failure, ok};
use crate::core::llm::ConversationTurn;
use crate::interfaces::web::AppState;

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    agent_id: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    conversation_history: Option<Vec<ConversationTurn>>,
}

/// Every handled failure is a 400 with the error envelope.
pub async fn chat_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResponse {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_json(rejection),
    };
    let history = payload.conversation_history.unwrap_or_default();

    match state
        .dispatcher
        .dispatch(&payload.agent_id, &payload.message, &history)
        .await
    {
        Ok(reply) => ok(json!({ "success": true, "response": reply })),
        Err(e) => {
            warn!("Chat dispatch for '{}' failed: {}", payload.agent_id, e);
            dispatch_failure(StatusCode::BAD_REQUEST, &e)
        }
    }
}
