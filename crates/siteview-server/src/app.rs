use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::middleware::require_auth, routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `CorsLayer`: the tracking script is embedded on public pages, so
///    browsers need CORS headers on `/api/track`.
/// 2. `TraceLayer`: structured request/response logging via `tracing`.
/// 3. `require_auth`: only on the `/api/analytics/*` routes.
pub fn build_app(state: Arc<AppState>) -> Router {
    let analytics = Router::new()
        .route("/api/analytics/dashboard", get(routes::analytics::get_dashboard))
        .route("/api/analytics/trends", get(routes::analytics::get_trends))
        .route(
            "/api/analytics/traffic-sources",
            get(routes::analytics::get_traffic_sources),
        )
        .route(
            "/api/analytics/popular-pages",
            get(routes::analytics::get_popular_pages),
        )
        .route("/api/analytics/realtime", get(routes::analytics::get_realtime))
        .route("/api/analytics/campaigns", get(routes::analytics::get_campaigns))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_auth,
        ));

    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/track", post(routes::track::track))
        .merge(analytics)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
