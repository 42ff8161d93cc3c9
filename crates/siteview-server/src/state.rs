use std::sync::Arc;

use siteview_core::{
    config::Config, ingest::IngestionGateway, metrics::MetricsEngine, store::AnalyticsStore,
};
use siteview_duckdb::DuckDbBackend;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
///
/// The gateway and the engine share one store handle; all fields are cheap to
/// clone.
pub struct AppState {
    pub store: Arc<dyn AnalyticsStore>,

    /// Validates and records tracking calls.
    pub gateway: IngestionGateway,

    /// Read-only aggregate queries for the dashboard endpoints.
    pub metrics: MetricsEngine,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,
}

impl AppState {
    /// Construct a new `AppState` backed by DuckDB.
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        Self::with_store(Arc::new(db), config)
    }

    /// Construct a new `AppState` over any [`AnalyticsStore`].
    pub fn with_store(store: Arc<dyn AnalyticsStore>, config: Config) -> Self {
        Self {
            gateway: IngestionGateway::new(Arc::clone(&store)),
            metrics: MetricsEngine::new(Arc::clone(&store)),
            store,
            config: Arc::new(config),
        }
    }
}
