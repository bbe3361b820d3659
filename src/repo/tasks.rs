//! Persistent task rows backing the async orchestrator's monotonic state machine.

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::Task;
use crate::domain::types::TaskStatus;

pub struct TasksRepo<'a> {
    pool: &'a SqlitePool,
}

fn row_to_task(row: sqlx::sqlite::SqliteRow) -> anyhow::Result<Task> {
    let task_id: String = row.get("task_id");
    let status: String = row.get("status");
    let payload: String = row.get("payload_json");
    let result: Option<String> = row.get("result_json");
    let created_at: String = row.get("created_at");
    let started_at: Option<String> = row.get("started_at");
    let finished_at: Option<String> = row.get("finished_at");
    Ok(Task {
        task_id: Uuid::parse_str(&task_id)?,
        task_type: row.get("task_type"),
        status: status.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        payload: serde_json::from_str(&payload)?,
        result: result.map(|r| serde_json::from_str(&r)).transpose()?,
        error_code: row.get("error_code"),
        error_message: row.get("error_message"),
        created_at: created_at.parse()?,
        started_at: started_at.map(|s| s.parse()).transpose()?,
        finished_at: finished_at.map(|s| s.parse()).transpose()?,
    })
}

impl<'a> TasksRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, task_type: &str, payload: Value) -> anyhow::Result<Task> {
        let task_id = Uuid::new_v4();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO tasks (task_id, task_type, status, payload_json, created_at) \
             VALUES (?, ?, 'PENDING', ?, ?)",
        )
        .bind(task_id.to_string())
        .bind(task_type)
        .bind(serde_json::to_string(&payload)?)
        .bind(created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(Task {
            task_id,
            task_type: task_type.to_string(),
            status: TaskStatus::Pending,
            payload,
            result: None,
            error_code: None,
            error_message: None,
            created_at,
            started_at: None,
            finished_at: None,
        })
    }

    pub async fn get(&self, task_id: Uuid) -> anyhow::Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE task_id = ?")
            .bind(task_id.to_string())
            .fetch_optional(self.pool)
            .await?;
        row.map(row_to_task).transpose()
    }

    /// PENDING -> RUNNING; a no-op (returns false) if the row is no longer PENDING,
    /// keeping the transition monotonic under concurrent dispatch.
    pub async fn mark_running(&self, task_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE tasks SET status = 'RUNNING', started_at = ? WHERE task_id = ? AND status = 'PENDING'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(task_id.to_string())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_succeeded(&self, task_id: Uuid, result: Value) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE tasks SET status = 'SUCCEEDED', result_json = ?, finished_at = ? \
             WHERE task_id = ? AND status = 'RUNNING'",
        )
        .bind(serde_json::to_string(&result)?)
        .bind(Utc::now().to_rfc3339())
        .bind(task_id.to_string())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, task_id: Uuid, error_code: &str, error_message: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE tasks SET status = 'FAILED', error_code = ?, error_message = ?, finished_at = ? \
             WHERE task_id = ? AND status = 'RUNNING'",
        )
        .bind(error_code)
        .bind(error_message)
        .bind(Utc::now().to_rfc3339())
        .bind(task_id.to_string())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_running(&self) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS c FROM tasks WHERE status = 'RUNNING'")
            .fetch_one(self.pool)
            .await?;
        Ok(row.get("c"))
    }

    /// RUNNING rows found at process start, before any worker has claimed them.
    pub async fn list_orphaned(&self) -> anyhow::Result<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE status = 'RUNNING'")
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(row_to_task).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;
    use serde_json::json;

    #[tokio::test]
    async fn lifecycle_is_monotonic() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = TasksRepo::new(&db.pool);
        let task = repo.create("ingest_bars_daily", json!({"symbol": "600519"})).await.unwrap();

        assert!(repo.mark_running(task.task_id).await.unwrap());
        assert!(!repo.mark_running(task.task_id).await.unwrap());

        repo.mark_succeeded(task.task_id, json!({"rows": 10})).await.unwrap();
        let reloaded = repo.get(task.task_id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Succeeded);

        // A failed transition after success is a no-op: status stays SUCCEEDED.
        repo.mark_failed(task.task_id, "E", "should not apply").await.unwrap();
        let reloaded = repo.get(task.task_id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Succeeded);
    }
}
