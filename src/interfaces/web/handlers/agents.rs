use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde_json::json;

use super::{ApiResponse, bad_json, not_found, ok, store_failure};
use crate::core::store::types::AgentInput;
use crate::interfaces::web::AppState;

pub async fn get_agents(State(state): State<AppState>) -> ApiResponse {
    match state.store.list_agents().await {
        Ok(agents) => ok(json!({ "success": true, "agents": agents })),
        Err(e) => store_failure(e),
    }
}

pub async fn get_agent(
    Path(agent_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResponse {
    match state.store.get_agent(&agent_id).await {
        Ok(Some(agent)) => ok(json!({ "success": true, "agent": agent })),
        Ok(None) => not_found(format!("agent '{}' not found", agent_id)),
        Err(e) => store_failure(e),
    }
}

pub async fn create_agent_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<AgentInput>, JsonRejection>,
) -> ApiResponse {
    let Json(input) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_json(rejection),
    };
    match state.store.create_agent(&input).await {
        Ok(agent) => ok(json!({ "success": true, "agent": agent })),
        Err(e) => store_failure(e),
    }
}

/// Upsert; the id in the path wins over any id in the body.
pub async fn update_agent_endpoint(
    Path(agent_id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<AgentInput>, JsonRejection>,
) -> ApiResponse {
    let Json(mut input) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_json(rejection),
    };
    input.agent_id = agent_id;
    match state.store.save_agent(&input).await {
        Ok(agent) => ok(json!({ "success": true, "agent": agent })),
        Err(e) => store_failure(e),
    }
}

pub async fn delete_agent_endpoint(
    Path(agent_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResponse {
    match state.store.delete_agent(&agent_id).await {
        Ok(true) => ok(json!({ "success": true })),
        Ok(false) => not_found(format!("agent '{}' not found", agent_id)),
        Err(e) => store_failure(e),
    }
}
