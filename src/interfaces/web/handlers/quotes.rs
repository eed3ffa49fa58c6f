use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use serde_json::json;

use super::{ApiResponse, bad_json, invalid_request, not_found, ok, store_failure};
use crate::core::store::types::{NewQuote, QuoteStatus};
use crate::interfaces::web::AppState;

#[derive(serde::Deserialize)]
pub struct QuoteListQuery {
    status: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct PriceItemRequest {
    unit_price: f64,
}

#[derive(serde::Deserialize)]
pub struct SetStatusRequest {
    status: String,
}

fn parse_status(raw: &str) -> Result<QuoteStatus, ApiResponse> {
    QuoteStatus::parse(raw).ok_or_else(|| invalid_request(format!("unknown quote status '{}'", raw)))
}

pub async fn list_quotes(
    Query(query): Query<QuoteListQuery>,
    State(state): State<AppState>,
) -> ApiResponse {
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => match parse_status(raw) {
            Ok(s) => Some(s),
            Err(resp) => return resp,
        },
        None => None,
    };
    match state.store.list_quotes(status).await {
        Ok(quotes) => ok(json!({ "success": true, "quotes": quotes })),
        Err(e) => store_failure(e),
    }
}

pub async fn create_quote(
    State(state): State<AppState>,
    payload: Result<Json<NewQuote>, JsonRejection>,
) -> ApiResponse {
    let Json(new) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_json(rejection),
    };
    match state.store.create_quote(&new).await {
        Ok(quote) => ok(json!({ "success": true, "quote": quote })),
        Err(e) => store_failure(e),
    }
}

pub async fn get_quote(Path(id): Path<String>, State(state): State<AppState>) -> ApiResponse {
    match state.store.get_quote(&id).await {
        Ok(Some(quote)) => ok(json!({ "success": true, "quote": quote })),
        Ok(None) => not_found(format!("quote '{}' not found", id)),
        Err(e) => store_failure(e),
    }
}

pub async fn price_item(
    Path((id, item_id)): Path<(String, String)>,
    State(state): State<AppState>,
    payload: Result<Json<PriceItemRequest>, JsonRejection>,
) -> ApiResponse {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_json(rejection),
    };
    match state.store.price_item(&id, &item_id, req.unit_price).await {
        Ok(Some(quote)) => ok(json!({ "success": true, "quote": quote })),
        Ok(None) => not_found(format!("item '{}' not found on quote '{}'", item_id, id)),
        Err(e) => store_failure(e),
    }
}

pub async fn set_status(
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<SetStatusRequest>, JsonRejection>,
) -> ApiResponse {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_json(rejection),
    };
    let status = match parse_status(&req.status) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match state.store.set_status(&id, status).await {
        Ok(Some(quote)) => ok(json!({ "success": true, "quote": quote })),
        Ok(None) => not_found(format!("quote '{}' not found", id)),
        Err(e) => store_failure(e),
    }
}
