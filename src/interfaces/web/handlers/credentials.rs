use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::json;

use super::{ApiResponse, bad_json, dispatch_failure, invalid_request, not_found, ok, store_failure};
use crate::core::error::DispatchError;
use crate::core::llm::Provider;
use crate::core::vault::{CredentialInput, CredentialSummary};
use crate::interfaces::web::AppState;

pub async fn list_credentials(State(state): State<AppState>) -> ApiResponse {
    match state.vault.list_credentials().await {
        Ok(credentials) => ok(json!({ "success": true, "credentials": credentials })),
        Err(e) => store_failure(e),
    }
}

/// Upsert by provider. The response carries the masked summary only.
pub async fn save_credential(
    State(state): State<AppState>,
    payload: Result<Json<CredentialInput>, JsonRejection>,
) -> ApiResponse {
    let Json(input) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_json(rejection),
    };
    match state.vault.save_credential(&input).await {
        Ok(saved) => ok(json!({
            "success": true,
            "credential": CredentialSummary::from(&saved),
        })),
        Err(e) => store_failure(e),
    }
}

pub async fn delete_credential(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResponse {
    match state.vault.delete_credential(&id).await {
        Ok(true) => ok(json!({ "success": true })),
        Ok(false) => not_found(format!("credential '{}' not found", id)),
        Err(e) => store_failure(e),
    }
}

pub async fn test_credential(
    Path(provider): Path<String>,
    State(state): State<AppState>,
) -> ApiResponse {
    let Some(provider) = Provider::from_id(&provider) else {
        return invalid_request(format!("unknown provider '{}'", provider));
    };
    match state.dispatcher.test_connection(provider).await {
        Ok(result) => ok(json!({
            "success": result.success,
            "provider": provider,
            "http_status": result.http_status,
        })),
        Err(e @ DispatchError::NotFound(_)) => dispatch_failure(StatusCode::NOT_FOUND, &e),
        Err(e) => dispatch_failure(StatusCode::BAD_REQUEST, &e),
    }
}
