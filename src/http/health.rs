use axum::extract::State;
use serde::Serialize;

use crate::errors::AppError;
use crate::http::envelope::Ok200;
use crate::http::state::AppState;
use crate::repo::tasks::TasksRepo;

#[derive(Serialize)]
pub struct HealthResponse {
    store_ok: bool,
    providers: Vec<ProviderStatus>,
    tasks_running: i64,
    orphaned_tasks: f64,
    latest_bar_ingested_at: Option<String>,
}

#[derive(Serialize)]
struct ProviderStatus {
    name: String,
    ok: bool,
}

pub async fn health(State(state): State<AppState>) -> Result<Ok200<HealthResponse>, AppError> {
    let store_ok = sqlx::query("SELECT 1").fetch_optional(&state.pool).await.is_ok();
    let providers = state
        .providers
        .statuses()
        .await
        .into_iter()
        .map(|(name, ok)| ProviderStatus { name, ok })
        .collect();
    let tasks_running = TasksRepo::new(&state.pool).count_running().await?;
    let latest_bar_ingested_at = crate::repo::bars::BarsRepo::new(&state.pool).latest_ingested_at().await?;
    let orphaned_tasks = state.metrics.orphaned_tasks.get();

    Ok(Ok200(HealthResponse {
        store_ok,
        providers,
        tasks_running,
        orphaned_tasks,
        latest_bar_ingested_at,
    }))
}
