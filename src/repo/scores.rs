//! Score snapshot storage: append-only, one row per scoring run.

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::ScoreSnapshot;
use crate::domain::types::Exchange;

pub struct ScoresRepo<'a> {
    pool: &'a SqlitePool,
}

fn row_to_score(row: sqlx::sqlite::SqliteRow) -> anyhow::Result<ScoreSnapshot> {
    let exchange: String = row.get("exchange");
    let score_id: String = row.get("score_id");
    let breakdown: String = row.get("breakdown_json");
    let reasons: String = row.get("reasons_json");
    let data_version: String = row.get("data_version_json");
    let created_at: String = row.get("created_at");
    Ok(ScoreSnapshot {
        score_id: Uuid::parse_str(&score_id)?,
        symbol: row.get("symbol"),
        exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        trade_date: row.get("trade_date"),
        score_total: row.get("score_total"),
        breakdown: serde_json::from_str(&breakdown)?,
        reasons: serde_json::from_str(&reasons)?,
        ruleset_version: row.get("ruleset_version"),
        data_version: serde_json::from_str(&data_version)?,
        created_at: created_at.parse()?,
    })
}

impl<'a> ScoresRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        &self,
        symbol: &str,
        exchange: Exchange,
        trade_date: chrono::NaiveDate,
        score_total: f64,
        breakdown: Value,
        reasons: Vec<String>,
        ruleset_version: &str,
        data_version: Value,
    ) -> anyhow::Result<ScoreSnapshot> {
        let score_id = Uuid::new_v4();
        let created_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO score_snapshots (
                score_id, symbol, exchange, trade_date, score_total,
                breakdown_json, reasons_json, ruleset_version, data_version_json, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(score_id.to_string())
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(trade_date)
        .bind(score_total)
        .bind(serde_json::to_string(&breakdown)?)
        .bind(serde_json::to_string(&reasons)?)
        .bind(ruleset_version)
        .bind(serde_json::to_string(&data_version)?)
        .bind(created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(ScoreSnapshot {
            score_id,
            symbol: symbol.to_string(),
            exchange,
            trade_date,
            score_total,
            breakdown,
            reasons,
            ruleset_version: ruleset_version.to_string(),
            data_version,
            created_at,
        })
    }

    pub async fn latest(&self, symbol: &str, exchange: Exchange) -> anyhow::Result<Option<ScoreSnapshot>> {
        let row = sqlx::query(
            "SELECT * FROM score_snapshots WHERE symbol = ? AND exchange = ? ORDER BY trade_date DESC, created_at DESC LIMIT 1",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .fetch_optional(self.pool)
        .await?;
        row.map(row_to_score).transpose()
    }

    /// Most recent `limit` snapshots, newest first; used to diff consecutive scoring runs.
    pub async fn list_recent(&self, symbol: &str, exchange: Exchange, limit: i64) -> anyhow::Result<Vec<ScoreSnapshot>> {
        let rows = sqlx::query(
            "SELECT * FROM score_snapshots WHERE symbol = ? AND exchange = ? ORDER BY trade_date DESC, created_at DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(row_to_score).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;
    use chrono::NaiveDate;
    use serde_json::json;

    #[tokio::test]
    async fn insert_then_latest_round_trips() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ScoresRepo::new(&db.pool);
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();

        repo.insert(
            "600519",
            Exchange::Sse,
            date,
            72.0,
            json!({"trend": 30}),
            vec!["last>MA20".to_string()],
            "score/tech_v1",
            json!({"bars_count": 60}),
        )
        .await
        .unwrap();

        let latest = repo.latest("600519", Exchange::Sse).await.unwrap().unwrap();
        assert_eq!(latest.score_total, 72.0);
        assert_eq!(latest.reasons, vec!["last>MA20".to_string()]);
    }

    #[tokio::test]
    async fn list_recent_orders_newest_first() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ScoresRepo::new(&db.pool);

        repo.insert(
            "600519",
            Exchange::Sse,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            60.0,
            json!({}),
            vec![],
            "score/tech_v1",
            json!({}),
        )
        .await
        .unwrap();
        repo.insert(
            "600519",
            Exchange::Sse,
            NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
            75.0,
            json!({}),
            vec![],
            "score/tech_v1",
            json!({}),
        )
        .await
        .unwrap();

        let recent = repo.list_recent("600519", Exchange::Sse, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].score_total, 75.0);
        assert_eq!(recent[1].score_total, 60.0);
    }
}
