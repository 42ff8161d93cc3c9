use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use siteview_server::{config::AuthMode, state::AppState};

/// `siteview health`: container probe against the local `/health` route.
///
/// Exits 0 only when the server answers 200, which requires the DuckDB store
/// to be reachable. The request gives up after a few seconds so a wedged
/// server counts as unhealthy instead of hanging the probe.
fn run_health_check() -> ! {
    let port = std::env::var("SITEVIEW_PORT").unwrap_or_else(|_| "3000".to_string());
    let agent = ureq::AgentBuilder::new()
        .timeout(std::time::Duration::from_secs(3))
        .build();
    let healthy = agent
        .get(&format!("http://127.0.0.1:{port}/health"))
        .call()
        .is_ok_and(|resp| resp.status() == 200);
    std::process::exit(if healthy { 0 } else { 1 })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }

    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("siteview=info".parse()?),
        )
        .json()
        .init();

    let cfg = siteview_server::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    std::fs::create_dir_all(&cfg.data_dir)?;
    let db = siteview_duckdb::DuckDbBackend::open(&cfg.db_path(), &cfg.duckdb_memory_limit)?;

    match &cfg.auth_mode {
        AuthMode::Jwt(_) => info!("Analytics endpoints require a bearer JWT"),
        AuthMode::None => info!("Auth disabled (SITEVIEW_AUTH=none), analytics endpoints open"),
    }

    let state = Arc::new(AppState::new(db, cfg.clone()));
    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = siteview_server::app::build_app(state);

    info!(port = cfg.port, "Siteview listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    info!("Shutdown complete");
    Ok(())
}
