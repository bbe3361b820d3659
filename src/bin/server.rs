//! Workbench HTTP server entrypoint: boots config, store, providers and the task
//! orchestrator, then serves the axum router until Ctrl+C.

use std::sync::Arc;

use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

use workbench::config::Config;
use workbench::http::state::AppState;
use workbench::infrastructure::observability::{Metrics, MetricsReporter};
use workbench::infrastructure::persistence::Database;
use workbench::infrastructure::providers::{HttpProvider, LocalProvider, ProviderRegistry};
use workbench::service::task_orchestrator::TaskOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::from_env()?;
    info!(db_path = %config.db_path, http_addr = %config.http_addr, "workbench starting");

    let db_url = format!("sqlite://{}", config.db_path);
    let db = Database::new(&db_url).await?;

    let mut registry = ProviderRegistry::new(config.provider_order.clone());
    registry.register(Arc::new(LocalProvider::new()));
    registry.register(Arc::new(HttpProvider::new(config.provider_base_url.clone(), config.provider_token.clone())));
    let providers = Arc::new(registry);

    let metrics = Arc::new(Metrics::new()?);

    let orchestrator = Arc::new(TaskOrchestrator::with_metrics(db.pool.clone(), providers.clone(), config.max_workers, metrics.clone()));
    let recovered = orchestrator.recover_orphaned().await?;
    if recovered > 0 {
        info!(recovered, "marked orphaned RUNNING tasks as FAILED at boot");
    }

    let state = AppState {
        pool: db.pool.clone(),
        config: Arc::new(config.clone()),
        providers,
        orchestrator,
        metrics,
    };

    if config.observability_enabled {
        let reporter = MetricsReporter::new(Database { pool: db.pool.clone() }, config.observability_interval_seconds);
        tokio::spawn(reporter.run());
    }

    let app = workbench::http::router(state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(addr = %config.http_addr, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
