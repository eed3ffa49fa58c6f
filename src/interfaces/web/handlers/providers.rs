use axum::extract::State;
use serde_json::json;

use super::{ApiResponse, ok};
use crate::interfaces::web::AppState;

pub async fn list_providers(State(state): State<AppState>) -> ApiResponse {
    let providers: Vec<_> = state
        .dispatcher
        .registry()
        .providers
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "name": p.name,
                "api_format": p.api_format,
                "chat_url": p.chat_url,
                "models_url": p.models_url,
                "default_model": p.default_model,
                "models": p.models,
            })
        })
        .collect();
    ok(json!({ "success": true, "providers": providers }))
}
