//! Authenticated read endpoints under `/api/analytics`.
//!
//! Every handler answers `{ "data": ... }` and takes the window from the
//! `period` query parameter (days, default 30).

use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::{
    auth::middleware::AuthContext, error::AppError, routes::query::AnalyticsQuery,
    state::AppState,
};

/// `GET /api/analytics/dashboard`: headline numbers for the window.
#[tracing::instrument(skip_all, fields(subject = %auth.subject))]
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let window = query.window(Utc::now())?;
    let stats = state.metrics.dashboard_stats(window).await?;
    Ok(Json(json!({ "data": stats })))
}

/// `GET /api/analytics/trends`: page views and distinct visitors per UTC day.
///
/// Days without events are omitted.
#[tracing::instrument(skip_all, fields(subject = %auth.subject))]
pub async fn get_trends(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let window = query.window(Utc::now())?;
    let series = state.metrics.visitor_trends(window).await?;
    Ok(Json(json!({ "data": series })))
}

/// `GET /api/analytics/traffic-sources`
#[tracing::instrument(skip_all, fields(subject = %auth.subject))]
pub async fn get_traffic_sources(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let window = query.window(Utc::now())?;
    let counts = state.metrics.traffic_sources(window).await?;
    Ok(Json(json!({ "data": counts })))
}

/// `GET /api/analytics/popular-pages`: top `limit` paths by views.
#[tracing::instrument(skip_all, fields(subject = %auth.subject))]
pub async fn get_popular_pages(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let window = query.window(Utc::now())?;
    let limit = query.limit()?;
    let pages = state.metrics.popular_pages(window, limit).await?;
    Ok(Json(json!({ "data": pages })))
}

/// `GET /api/analytics/realtime`: sessions seen in the last few minutes.
#[tracing::instrument(skip_all, fields(subject = %auth.subject))]
pub async fn get_realtime(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let users = state.metrics.realtime_active_users(Utc::now()).await?;
    Ok(Json(json!({ "data": users })))
}

/// `GET /api/analytics/campaigns`
#[tracing::instrument(skip_all, fields(subject = %auth.subject))]
pub async fn get_campaigns(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let window = query.window(Utc::now())?;
    let campaigns = state.metrics.campaign_performance(window).await?;
    Ok(Json(json!({ "data": campaigns })))
}
