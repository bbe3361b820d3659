//! Async task orchestrator: a bounded in-process worker pool dispatching by task
//! type, backed by the persistent, monotonic `tasks` table.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::Semaphore;
use tracing::error;
use uuid::Uuid;

use crate::domain::models::Task;
use crate::domain::types::{Adj, Exchange};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::providers::ProviderRegistry;
use crate::repo::bars::BarsRepo;
use crate::repo::capital_flow::CapitalFlowRepo;
use crate::repo::fundamentals::FundamentalsRepo;
use crate::repo::instruments::InstrumentsRepo;
use crate::repo::radar::RadarRepo;
use crate::repo::tasks::TasksRepo;
use crate::repo::watchlists::WatchlistsRepo;
use crate::service::radar::{self, RadarRule};

pub struct TaskOrchestrator {
    pool: SqlitePool,
    providers: Arc<ProviderRegistry>,
    semaphore: Arc<Semaphore>,
    metrics: Arc<Metrics>,
}

fn payload_symbols(payload: &Value) -> anyhow::Result<Vec<(String, Exchange)>> {
    let list = payload
        .get("symbols")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("payload missing symbols array"))?;
    list.iter()
        .map(|entry| {
            let symbol = entry
                .get("symbol")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("symbols[] entry missing symbol"))?
                .to_string();
            let exchange = entry
                .get("exchange")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("symbols[] entry missing exchange"))?
                .parse::<Exchange>()
                .map_err(|e| anyhow::anyhow!(e))?;
            Ok((symbol, exchange))
        })
        .collect()
}

async fn ingest_instruments(pool: &SqlitePool, providers: &ProviderRegistry) -> anyhow::Result<Value> {
    let rows = providers.iter_instruments().await?;
    let n = InstrumentsRepo::new(pool).upsert_many(&rows).await?;
    Ok(serde_json::json!({ "rows": n }))
}

async fn ingest_bars_daily(pool: &SqlitePool, providers: &ProviderRegistry, payload: &Value) -> anyhow::Result<Value> {
    let symbols = payload_symbols(payload)?;
    let start_date = payload.get("start_date").and_then(Value::as_str).and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
    let end_date = payload.get("end_date").and_then(Value::as_str).and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
    let adj = payload.get("adj").and_then(Value::as_str).and_then(|s| s.parse::<Adj>().ok()).unwrap_or_default();

    let bars = BarsRepo::new(pool);
    let mut total = 0u64;
    for (symbol, exchange) in symbols {
        let rows = providers.fetch_bars_daily(&symbol, exchange, start_date, end_date, adj).await?;
        total += bars.upsert_many(&rows, "provider").await?;
    }
    Ok(serde_json::json!({ "rows": total }))
}

async fn ingest_fundamentals_daily(pool: &SqlitePool, providers: &ProviderRegistry, payload: &Value) -> anyhow::Result<Value> {
    let symbols = payload_symbols(payload)?;
    let fundamentals = FundamentalsRepo::new(pool);
    let mut total = 0u64;
    for (symbol, exchange) in symbols {
        let rows = providers.fetch_fundamentals_daily(&symbol, exchange).await?;
        total += fundamentals.upsert_many(&rows).await?;
    }
    Ok(serde_json::json!({ "rows": total }))
}

async fn ingest_capital_flow_daily(pool: &SqlitePool, providers: &ProviderRegistry, payload: &Value) -> anyhow::Result<Value> {
    let symbols = payload_symbols(payload)?;
    let capital_flow = CapitalFlowRepo::new(pool);
    let mut total = 0u64;
    for (symbol, exchange) in symbols {
        let rows = providers.fetch_capital_flow_daily(&symbol, exchange).await?;
        total += capital_flow.upsert_many(&rows).await?;
    }
    Ok(serde_json::json!({ "rows": total }))
}

async fn run_radar(pool: &SqlitePool, task_id: Uuid, payload: &Value) -> anyhow::Result<Value> {
    let universe = payload.get("universe").cloned().unwrap_or_else(|| serde_json::json!({"type": "ALL"}));
    let rules: Vec<RadarRule> = payload
        .get("rules")
        .cloned()
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or_default();

    let instruments = InstrumentsRepo::new(pool);
    let watchlists = WatchlistsRepo::new(pool);
    let bars = BarsRepo::new(pool);
    let radar_repo = RadarRepo::new(pool);

    let outcome = radar::run(&instruments, &watchlists, &bars, &radar_repo, task_id, &universe, &rules).await?;
    Ok(serde_json::json!({
        "count": outcome.count,
        "skipped_no_data": outcome.skipped_no_data,
    }))
}

async fn dispatch(pool: &SqlitePool, providers: &ProviderRegistry, task_id: Uuid, task_type: &str, payload: &Value) -> anyhow::Result<Value> {
    match task_type {
        "ingest_instruments" => ingest_instruments(pool, providers).await,
        "ingest_bars_daily" => ingest_bars_daily(pool, providers, payload).await,
        "ingest_fundamentals_daily" => ingest_fundamentals_daily(pool, providers, payload).await,
        "ingest_capital_flow_daily" => ingest_capital_flow_daily(pool, providers, payload).await,
        "radar_run" => run_radar(pool, task_id, payload).await,
        other => Err(anyhow::anyhow!("unknown task type: {other}")),
    }
}

async fn run_and_record(
    pool: SqlitePool,
    providers: Arc<ProviderRegistry>,
    metrics: Arc<Metrics>,
    task_id: Uuid,
    task_type: String,
    payload: Value,
) {
    let tasks = TasksRepo::new(&pool);
    match tasks.mark_running(task_id).await {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            error!(%task_id, error = %e, "failed to mark task running");
            return;
        }
    }
    metrics.tasks_in_flight.inc();

    match dispatch(&pool, &providers, task_id, &task_type, &payload).await {
        Ok(result) => {
            if let Err(e) = tasks.mark_succeeded(task_id, result).await {
                error!(%task_id, error = %e, "failed to record task success");
            }
            metrics.inc_task(&task_type, "SUCCEEDED");
        }
        Err(e) => {
            if let Err(store_err) = tasks.mark_failed(task_id, "INTERNAL_ERROR", &e.to_string()).await {
                error!(%task_id, error = %store_err, "failed to record task failure");
            }
            metrics.inc_task(&task_type, "FAILED");
        }
    }
    metrics.tasks_in_flight.dec();
}

impl TaskOrchestrator {
    pub fn new(pool: SqlitePool, providers: Arc<ProviderRegistry>, max_workers: usize) -> Self {
        Self::with_metrics(pool, providers, max_workers, Arc::new(Metrics::default()))
    }

    pub fn with_metrics(pool: SqlitePool, providers: Arc<ProviderRegistry>, max_workers: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            pool,
            providers,
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
            metrics,
        }
    }

    /// Persists a PENDING task row and schedules it on the worker pool. Returns
    /// immediately; the caller polls `get` for completion.
    pub async fn submit(&self, task_type: &str, payload: Value) -> anyhow::Result<Task> {
        let tasks = TasksRepo::new(&self.pool);
        let task = tasks.create(task_type, payload.clone()).await?;

        let pool = self.pool.clone();
        let providers = self.providers.clone();
        let metrics = self.metrics.clone();
        let semaphore = self.semaphore.clone();
        let task_id = task.task_id;
        let task_type = task_type.to_string();

        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            run_and_record(pool, providers, metrics, task_id, task_type, payload).await;
        });

        Ok(task)
    }

    pub async fn get(&self, task_id: Uuid) -> anyhow::Result<Option<Task>> {
        TasksRepo::new(&self.pool).get(task_id).await
    }

    /// Marks every RUNNING row FAILED at process start; this process cannot know
    /// whether the worker that held it is still alive, so it never auto-resumes.
    pub async fn recover_orphaned(&self) -> anyhow::Result<usize> {
        let tasks = TasksRepo::new(&self.pool);
        let orphaned = tasks.list_orphaned().await?;
        for task in &orphaned {
            tasks.mark_failed(task.task_id, "ORPHANED", "process restarted while task was running").await?;
        }
        self.metrics.orphaned_tasks.set(orphaned.len() as f64);
        Ok(orphaned.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::TaskStatus;
    use crate::infrastructure::persistence::Database;
    use crate::infrastructure::providers::LocalProvider;

    fn test_registry() -> Arc<ProviderRegistry> {
        let mut registry = ProviderRegistry::new(vec!["local".to_string()]);
        registry.register(Arc::new(LocalProvider::new()));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn submit_runs_to_completion() {
        let db = Database::new_in_memory().await.unwrap();
        let orchestrator = TaskOrchestrator::new(db.pool.clone(), test_registry(), 2);

        let task = orchestrator.submit("ingest_instruments", serde_json::json!({})).await.unwrap();

        let mut reloaded = orchestrator.get(task.task_id).await.unwrap().unwrap();
        for _ in 0..50 {
            if reloaded.status != TaskStatus::Pending && reloaded.status != TaskStatus::Running {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            reloaded = orchestrator.get(task.task_id).await.unwrap().unwrap();
        }

        assert_eq!(reloaded.status, TaskStatus::Succeeded);
    }

    #[tokio::test]
    async fn unknown_task_type_fails() {
        let db = Database::new_in_memory().await.unwrap();
        let orchestrator = TaskOrchestrator::new(db.pool.clone(), test_registry(), 1);

        let task = orchestrator.submit("not_a_real_task", serde_json::json!({})).await.unwrap();

        let mut reloaded = orchestrator.get(task.task_id).await.unwrap().unwrap();
        for _ in 0..50 {
            if reloaded.status != TaskStatus::Pending && reloaded.status != TaskStatus::Running {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            reloaded = orchestrator.get(task.task_id).await.unwrap().unwrap();
        }

        assert_eq!(reloaded.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn recover_orphaned_fails_running_rows_left_from_a_prior_process() {
        let db = Database::new_in_memory().await.unwrap();
        let tasks = TasksRepo::new(&db.pool);
        let task = tasks.create("ingest_bars_daily", serde_json::json!({})).await.unwrap();
        tasks.mark_running(task.task_id).await.unwrap();

        let orchestrator = TaskOrchestrator::new(db.pool.clone(), test_registry(), 1);
        let recovered = orchestrator.recover_orphaned().await.unwrap();
        assert_eq!(recovered, 1);

        let reloaded = orchestrator.get(task.task_id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Failed);
    }
}
