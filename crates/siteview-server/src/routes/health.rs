use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// `ok` or `degraded`.
    pub status: &'static str,
    /// Whether the session/event store answered its ping.
    pub store_reachable: bool,
    pub version: &'static str,
}

/// `GET /health`: ingestion and dashboards both need the analytics store, so
/// the service is only healthy while the store answers a ping. Responds
/// `503` with `status: "degraded"` otherwise.
#[tracing::instrument(skip(state))]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let ping = state.store.ping().await;
    if let Err(e) = &ping {
        tracing::error!(error = %e, "Analytics store failed health ping");
    }

    let store_reachable = ping.is_ok();
    let (code, status) = if store_reachable {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        code,
        Json(HealthReport {
            status,
            store_reachable,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
