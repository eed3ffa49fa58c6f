pub mod agents;
pub mod chat;
pub mod credentials;
pub mod providers;
pub mod quotes;

use axum::{Json, extract::rejection::JsonRejection, http::StatusCode};
use serde_json::{Value, json};
use tracing::error;

use crate::core::error::{DispatchError, is_invalid_input};

pub(crate) type ApiResponse = (StatusCode, Json<Value>);

pub(crate) fn ok(body: Value) -> ApiResponse {
    (StatusCode::OK, Json(body))
}

/// The failure envelope shared by every route.
pub(crate) fn failure(status: StatusCode, kind: &str, message: impl Into<String>) -> ApiResponse {
    (
        status,
        Json(json!({ "success": false, "error": message.into(), "kind": kind })),
    )
}

pub(crate) fn not_found(message: impl Into<String>) -> ApiResponse {
    failure(StatusCode::NOT_FOUND, "not_found", message)
}

pub(crate) fn invalid_request(message: impl Into<String>) -> ApiResponse {
    failure(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub(crate) fn bad_json(rejection: JsonRejection) -> ApiResponse {
    invalid_request(format!("invalid JSON body: {}", rejection.body_text()))
}

/// Store errors: rejected input keeps its message, anything else is logged.
pub(crate) fn store_failure(err: anyhow::Error) -> ApiResponse {
    if is_invalid_input(&err) {
        return invalid_request(err.to_string());
    }
    error!("Storage error: {:#}", err);
    failure(StatusCode::BAD_REQUEST, "storage_error", err.to_string())
}

pub(crate) fn dispatch_failure(status: StatusCode, err: &DispatchError) -> ApiResponse {
    let mut body = json!({ "success": false, "error": err.to_string(), "kind": err.kind() });
    if let DispatchError::Provider {
        provider,
        http_status,
        ..
    } = err
    {
        body["provider"] = json!(provider);
        body["http_status"] = json!(http_status);
    }
    (status, Json(body))
}
