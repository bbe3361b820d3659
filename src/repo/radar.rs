//! Radar scan templates and per-run results, ranked by score for deterministic output.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::{RadarResult, RadarTemplate};
use crate::domain::types::Exchange;

pub struct RadarRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RadarRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_template(
        &self,
        name: &str,
        universe: serde_json::Value,
        rules: serde_json::Value,
    ) -> anyhow::Result<RadarTemplate> {
        let template_id = Uuid::new_v4();
        sqlx::query("INSERT INTO radar_templates (template_id, name, universe_json, rules_json) VALUES (?, ?, ?, ?)")
            .bind(template_id.to_string())
            .bind(name)
            .bind(serde_json::to_string(&universe)?)
            .bind(serde_json::to_string(&rules)?)
            .execute(self.pool)
            .await?;

        Ok(RadarTemplate {
            template_id,
            name: name.to_string(),
            universe,
            rules,
        })
    }

    pub async fn get_template(&self, template_id: Uuid) -> anyhow::Result<Option<RadarTemplate>> {
        let row = sqlx::query("SELECT * FROM radar_templates WHERE template_id = ?")
            .bind(template_id.to_string())
            .fetch_optional(self.pool)
            .await?;

        row.map(|row| {
            let template_id: String = row.get("template_id");
            let universe: String = row.get("universe_json");
            let rules: String = row.get("rules_json");
            Ok(RadarTemplate {
                template_id: Uuid::parse_str(&template_id)?,
                name: row.get("name"),
                universe: serde_json::from_str(&universe)?,
                rules: serde_json::from_str(&rules)?,
            })
        })
        .transpose()
    }

    pub async fn insert_result(&self, result: &RadarResult) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO radar_results (task_id, symbol, exchange, score_total, breakdown_json, reasons_json, key_metrics_json)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(task_id, symbol, exchange) DO UPDATE SET
                score_total = excluded.score_total,
                breakdown_json = excluded.breakdown_json,
                reasons_json = excluded.reasons_json,
                key_metrics_json = excluded.key_metrics_json
            "#,
        )
        .bind(result.task_id.to_string())
        .bind(&result.symbol)
        .bind(result.exchange.to_string())
        .bind(result.score_total)
        .bind(serde_json::to_string(&result.breakdown)?)
        .bind(serde_json::to_string(&result.reasons)?)
        .bind(serde_json::to_string(&result.key_metrics)?)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Results for a run, highest score first; ties break by symbol for determinism.
    pub async fn list_results(&self, task_id: Uuid) -> anyhow::Result<Vec<RadarResult>> {
        let rows = sqlx::query(
            "SELECT * FROM radar_results WHERE task_id = ? ORDER BY score_total DESC, symbol ASC",
        )
        .bind(task_id.to_string())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let task_id: String = row.get("task_id");
                let exchange: String = row.get("exchange");
                let breakdown: String = row.get("breakdown_json");
                let reasons: String = row.get("reasons_json");
                let key_metrics: String = row.get("key_metrics_json");
                Ok(RadarResult {
                    task_id: Uuid::parse_str(&task_id)?,
                    symbol: row.get("symbol"),
                    exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                    score_total: row.get("score_total"),
                    breakdown: serde_json::from_str(&breakdown)?,
                    reasons: serde_json::from_str(&reasons)?,
                    key_metrics: serde_json::from_str(&key_metrics)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;
    use serde_json::json;

    #[tokio::test]
    async fn results_rank_by_score_then_symbol() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = RadarRepo::new(&db.pool);
        let task_id = Uuid::new_v4();

        for (symbol, score) in [("000001", 50.0), ("600519", 80.0), ("300750", 80.0)] {
            repo.insert_result(&RadarResult {
                task_id,
                symbol: symbol.to_string(),
                exchange: Exchange::infer_from_symbol(symbol),
                score_total: score,
                breakdown: json!({}),
                reasons: vec![],
                key_metrics: json!({}),
            })
            .await
            .unwrap();
        }

        let results = repo.list_results(task_id).await.unwrap();
        assert_eq!(results[0].symbol, "300750");
        assert_eq!(results[1].symbol, "600519");
        assert_eq!(results[2].symbol, "000001");
    }
}
