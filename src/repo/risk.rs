//! Risk check result ledger and the `risk_rules` per-key override table.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::{RiskCheckItem, RiskCheckResult};
use crate::domain::types::RiskStatus;

pub struct RiskRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RiskRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_result(
        &self,
        portfolio_id: Uuid,
        status: RiskStatus,
        items: Vec<RiskCheckItem>,
        ruleset_version: &str,
        input_draft_ids: Vec<Uuid>,
    ) -> anyhow::Result<RiskCheckResult> {
        let riskcheck_id = Uuid::new_v4();
        let created_at = Utc::now();
        let draft_id_strings: Vec<String> = input_draft_ids.iter().map(Uuid::to_string).collect();

        sqlx::query(
            r#"
            INSERT INTO risk_check_results (riskcheck_id, portfolio_id, status, items_json, ruleset_version, input_draft_ids_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(riskcheck_id.to_string())
        .bind(portfolio_id.to_string())
        .bind(status.to_string())
        .bind(serde_json::to_string(&items)?)
        .bind(ruleset_version)
        .bind(serde_json::to_string(&draft_id_strings)?)
        .bind(created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(RiskCheckResult {
            riskcheck_id,
            portfolio_id,
            status,
            items,
            ruleset_version: ruleset_version.to_string(),
            input_draft_ids,
            created_at,
        })
    }

    pub async fn get_result(&self, riskcheck_id: Uuid) -> anyhow::Result<Option<RiskCheckResult>> {
        let row = sqlx::query("SELECT * FROM risk_check_results WHERE riskcheck_id = ?")
            .bind(riskcheck_id.to_string())
            .fetch_optional(self.pool)
            .await?;

        row.map(|row| {
            let riskcheck_id: String = row.get("riskcheck_id");
            let portfolio_id: String = row.get("portfolio_id");
            let status: String = row.get("status");
            let items: String = row.get("items_json");
            let draft_ids: String = row.get("input_draft_ids_json");
            let created_at: String = row.get("created_at");
            let draft_id_strings: Vec<String> = serde_json::from_str(&draft_ids)?;
            Ok(RiskCheckResult {
                riskcheck_id: Uuid::parse_str(&riskcheck_id)?,
                portfolio_id: Uuid::parse_str(&portfolio_id)?,
                status: status.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                items: serde_json::from_str(&items)?,
                ruleset_version: row.get("ruleset_version"),
                input_draft_ids: draft_id_strings
                    .iter()
                    .map(|s| Uuid::parse_str(s))
                    .collect::<Result<_, _>>()?,
                created_at: created_at.parse()?,
            })
        })
        .transpose()
    }

    /// Reads a named rule override, if one has been set via the risk-rules endpoint.
    pub async fn get_override(&self, rule_key: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM risk_rule_overrides WHERE rule_key = ?")
            .bind(rule_key)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    pub async fn set_override(&self, rule_key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO risk_rule_overrides (rule_key, value) VALUES (?, ?) \
             ON CONFLICT(rule_key) DO UPDATE SET value = excluded.value",
        )
        .bind(rule_key)
        .bind(value)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_overrides(&self) -> anyhow::Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT rule_key, value FROM risk_rule_overrides")
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| (r.get("rule_key"), r.get("value"))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;

    #[tokio::test]
    async fn set_override_then_get_round_trips() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = RiskRepo::new(&db.pool);
        repo.set_override("max_orders_per_day", "25").await.unwrap();
        let value = repo.get_override("max_orders_per_day").await.unwrap();
        assert_eq!(value, Some("25".to_string()));
    }

    #[tokio::test]
    async fn insert_result_then_get_round_trips() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = RiskRepo::new(&db.pool);
        let portfolio_id = Uuid::new_v4();
        let result = repo
            .insert_result(portfolio_id, RiskStatus::Warn, vec![], "risk/v1", vec![])
            .await
            .unwrap();
        let fetched = repo.get_result(result.riskcheck_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RiskStatus::Warn);
    }
}
