use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use siteview_core::event::TrackPayload;

use crate::{error::AppError, state::AppState};

/// `POST /api/track`: record one page view.
///
/// ## Auth
/// None. The tracking script runs on public pages.
///
/// ## Enrichment
/// - `user_agent` falls back to the `User-Agent` header when the body omits it.
/// - The origin address is the first `X-Forwarded-For` entry, else `X-Real-IP`.
///
/// ## Response
/// `201 Created` with `{ "data": <stored event> }`.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn track(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<TrackPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(mut payload) = payload.map_err(|rejection| AppError::BadRequest {
        field: None,
        message: rejection.body_text(),
    })?;

    if payload.user_agent.is_none() {
        payload.user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
    }

    let event = state
        .gateway
        .record(payload, extract_origin_address(&headers))
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "data": event }))))
}

/// Client address as reported by the reverse proxy, if any.
fn extract_origin_address(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    forwarded.or_else(real_ip).map(str::to_string)
}
