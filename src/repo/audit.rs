//! Append-only audit log: one row per state-changing operation, never updated.

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::AuditLog;

pub struct AuditRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        actor: &str,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        input: Value,
        output: Value,
        ruleset_version: Option<String>,
        data_version: Option<Value>,
    ) -> anyhow::Result<AuditLog> {
        let audit_id = Uuid::new_v4();
        let ts = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO audit_logs (audit_id, ts, actor, action, entity_type, entity_id, input_json, output_json, ruleset_version, data_version_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(audit_id.to_string())
        .bind(ts.to_rfc3339())
        .bind(actor)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(serde_json::to_string(&input)?)
        .bind(serde_json::to_string(&output)?)
        .bind(&ruleset_version)
        .bind(data_version.as_ref().map(serde_json::to_string).transpose()?)
        .execute(self.pool)
        .await?;

        Ok(AuditLog {
            audit_id,
            ts,
            actor: actor.to_string(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            input,
            output,
            ruleset_version,
            data_version,
        })
    }

    pub async fn list_for_entity(&self, entity_type: &str, entity_id: &str, limit: i64) -> anyhow::Result<Vec<AuditLog>> {
        let rows = sqlx::query(
            "SELECT * FROM audit_logs WHERE entity_type = ? AND entity_id = ? ORDER BY ts DESC LIMIT ?",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let audit_id: String = row.get("audit_id");
                let ts: String = row.get("ts");
                let input: String = row.get("input_json");
                let output: String = row.get("output_json");
                let data_version: Option<String> = row.get("data_version_json");
                Ok(AuditLog {
                    audit_id: Uuid::parse_str(&audit_id)?,
                    ts: ts.parse()?,
                    actor: row.get("actor"),
                    action: row.get("action"),
                    entity_type: row.get("entity_type"),
                    entity_id: row.get("entity_id"),
                    input: serde_json::from_str(&input)?,
                    output: serde_json::from_str(&output)?,
                    ruleset_version: row.get("ruleset_version"),
                    data_version: data_version.map(|d| serde_json::from_str(&d)).transpose()?,
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
    async fn record_then_list_for_entity_round_trips() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = AuditRepo::new(&db.pool);
        repo.record(
            "system",
            "risk_check",
            "portfolio",
            "demo-portfolio",
            json!({"draft_ids": []}),
            json!({"status": "PASS"}),
            Some("risk/v1".to_string()),
            None,
        )
        .await
        .unwrap();

        let entries = repo.list_for_entity("portfolio", "demo-portfolio", 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "risk_check");
    }
}
