use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;
use super::handlers::failure;

pub const ACCESS_KEY_HEADER: &str = "x-flowdesk-access-key";

fn is_loopback(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "::1" | "localhost")
}

fn unauthorized(message: &str) -> Response {
    failure(StatusCode::UNAUTHORIZED, "unauthorized", message).into_response()
}

pub async fn require_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    // 1. Configured access key
    if let Some(expected) = &state.access_key
        && let Some(header) = req.headers().get(ACCESS_KEY_HEADER)
        && header.to_str().is_ok_and(|v| v == expected)
    {
        return next.run(req).await;
    }

    // 2. No tokens issued: open on loopback only
    let any_tokens_exist = match state.store.has_any_api_tokens().await {
        Ok(found) => found,
        Err(e) => {
            tracing::error!("Token lookup failed: {}", e);
            return unauthorized("Unable to verify API token");
        }
    };
    if !any_tokens_exist {
        if is_loopback(&state.api_host) {
            return next.run(req).await;
        }
        return unauthorized(
            "No API tokens configured. Create one with `flowdesk token create <name>` before exposing on a non-loopback address.",
        );
    }

    // 3. Bearer token
    let raw_token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let Some(raw_token) = raw_token else {
        return unauthorized("Missing or invalid Authorization header. Use: Bearer <token>");
    };

    if state
        .store
        .validate_api_token(&raw_token)
        .await
        .unwrap_or(false)
    {
        next.run(req).await
    } else {
        unauthorized("Invalid or unauthorized API token")
    }
}
