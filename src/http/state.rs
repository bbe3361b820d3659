//! Shared application state handed to every axum handler.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::providers::ProviderRegistry;
use crate::service::task_orchestrator::TaskOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub providers: Arc<ProviderRegistry>,
    pub orchestrator: Arc<TaskOrchestrator>,
    pub metrics: Arc<Metrics>,
}
