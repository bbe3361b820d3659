//! Push-based metrics reporter for the workbench.
//!
//! Periodically outputs a JSON snapshot of orchestrator and store state to stdout.
//! No HTTP server, no incoming connections — only outbound data. Prometheus scraping
//! is served separately at `GET /metrics` (see `infrastructure::observability::Metrics`).

use serde::Serialize;
use sqlx::Row;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::infrastructure::persistence::Database;

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub tasks: TaskSnapshot,
    pub portfolios_count: i64,
    pub last_bar_ingested_at: Option<String>,
}

#[derive(Serialize)]
pub struct TaskSnapshot {
    pub pending: i64,
    pub running: i64,
    pub succeeded: i64,
    pub failed: i64,
}

pub struct MetricsReporter {
    db: Database,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(db: Database, interval_seconds: u64) -> Self {
        Self {
            db,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    pub async fn run(self) {
        info!(interval = ?self.interval, "metrics reporter starting");

        loop {
            tokio::time::sleep(self.interval).await;

            match self.collect_snapshot().await {
                Ok(snapshot) => match serde_json::to_string(&snapshot) {
                    Ok(json) => {
                        println!("METRICS_JSON:{json}");
                        info!(
                            tasks_running = snapshot.tasks.running,
                            tasks_pending = snapshot.tasks.pending,
                            uptime_seconds = snapshot.uptime_seconds,
                            "snapshot emitted"
                        );
                    }
                    Err(e) => warn!(error = %e, "failed to serialize metrics snapshot"),
                },
                Err(e) => warn!(error = %e, "failed to collect metrics snapshot"),
            }
        }
    }

    async fn collect_snapshot(&self) -> anyhow::Result<MetricsSnapshot> {
        let uptime = self.start_time.elapsed().as_secs();

        let mut tasks = TaskSnapshot {
            pending: 0,
            running: 0,
            succeeded: 0,
            failed: 0,
        };
        let rows = sqlx::query("SELECT status, COUNT(*) AS c FROM tasks GROUP BY status")
            .fetch_all(&self.db.pool)
            .await?;
        for row in rows {
            let status: String = row.get("status");
            let count: i64 = row.get("c");
            match status.as_str() {
                "PENDING" => tasks.pending = count,
                "RUNNING" => tasks.running = count,
                "SUCCEEDED" => tasks.succeeded = count,
                "FAILED" => tasks.failed = count,
                _ => {}
            }
        }

        let portfolios_count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM portfolios")
            .fetch_one(&self.db.pool)
            .await?
            .get("c");

        let last_bar_ingested_at: Option<String> =
            sqlx::query("SELECT MAX(ingested_at) AS m FROM bars_daily")
                .fetch_one(&self.db.pool)
                .await?
                .get("m");

        Ok(MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            tasks,
            portfolios_count,
            last_bar_ingested_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collects_snapshot_against_empty_store() {
        let db = Database::new_in_memory().await.expect("in-memory store");
        let reporter = MetricsReporter::new(db, 60);
        let snapshot = reporter.collect_snapshot().await.expect("snapshot collects");
        assert_eq!(snapshot.portfolios_count, 0);
        assert_eq!(snapshot.tasks.running, 0);
    }
}
