//! Alert rules and fired alerts, scanned by the monitor service on a tick.

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::{Alert, AlertRule};
use crate::domain::types::Exchange;

pub struct AlertsRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AlertsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_rule(
        &self,
        portfolio_id: Option<Uuid>,
        symbol: Option<String>,
        exchange: Option<Exchange>,
        rule_type: &str,
        threshold: f64,
        direction: &str,
    ) -> anyhow::Result<AlertRule> {
        let rule_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO alert_rules (rule_id, portfolio_id, symbol, exchange, rule_type, threshold, direction, enabled)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(rule_id.to_string())
        .bind(portfolio_id.map(|p| p.to_string()))
        .bind(&symbol)
        .bind(exchange.map(|e| e.to_string()))
        .bind(rule_type)
        .bind(threshold)
        .bind(direction)
        .execute(self.pool)
        .await?;

        Ok(AlertRule {
            rule_id,
            portfolio_id,
            symbol,
            exchange,
            rule_type: rule_type.to_string(),
            threshold,
            direction: direction.to_string(),
            enabled: true,
        })
    }

    pub async fn list_enabled_rules(&self) -> anyhow::Result<Vec<AlertRule>> {
        let rows = sqlx::query("SELECT * FROM alert_rules WHERE enabled = 1")
            .fetch_all(self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let rule_id: String = row.get("rule_id");
                let portfolio_id: Option<String> = row.get("portfolio_id");
                let exchange: Option<String> = row.get("exchange");
                Ok(AlertRule {
                    rule_id: Uuid::parse_str(&rule_id)?,
                    portfolio_id: portfolio_id.map(|p| Uuid::parse_str(&p)).transpose()?,
                    symbol: row.get("symbol"),
                    exchange: exchange.map(|e| e.parse()).transpose().map_err(|e: String| anyhow::anyhow!(e))?,
                    rule_type: row.get("rule_type"),
                    threshold: row.get("threshold"),
                    direction: row.get("direction"),
                    enabled: row.get::<i64, _>("enabled") != 0,
                })
            })
            .collect()
    }

    pub async fn fire(&self, rule_id: Uuid, severity: &str, message: &str, data: Value) -> anyhow::Result<Alert> {
        let alert_id = Uuid::new_v4();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO alerts (alert_id, rule_id, severity, message, data_json, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(alert_id.to_string())
        .bind(rule_id.to_string())
        .bind(severity)
        .bind(message)
        .bind(serde_json::to_string(&data)?)
        .bind(created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(Alert {
            alert_id,
            rule_id,
            severity: severity.to_string(),
            message: message.to_string(),
            data,
            created_at,
        })
    }

    /// Timestamp of the most recent alert fired for `rule_id`, used to debounce re-firing.
    pub async fn last_fired_at(&self, rule_id: Uuid) -> anyhow::Result<Option<chrono::DateTime<Utc>>> {
        let row = sqlx::query("SELECT created_at FROM alerts WHERE rule_id = ? ORDER BY created_at DESC LIMIT 1")
            .bind(rule_id.to_string())
            .fetch_optional(self.pool)
            .await?;
        row.map(|row| {
            let created_at: String = row.get("created_at");
            Ok(created_at.parse()?)
        })
        .transpose()
    }

    pub async fn list_recent(&self, limit: i64) -> anyhow::Result<Vec<Alert>> {
        let rows = sqlx::query("SELECT * FROM alerts ORDER BY created_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let alert_id: String = row.get("alert_id");
                let rule_id: String = row.get("rule_id");
                let data: String = row.get("data_json");
                let created_at: String = row.get("created_at");
                Ok(Alert {
                    alert_id: Uuid::parse_str(&alert_id)?,
                    rule_id: Uuid::parse_str(&rule_id)?,
                    severity: row.get("severity"),
                    message: row.get("message"),
                    data: serde_json::from_str(&data)?,
                    created_at: created_at.parse()?,
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
    async fn create_rule_then_fire_round_trips() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = AlertsRepo::new(&db.pool);
        let rule = repo
            .create_rule(None, Some("600519".to_string()), Some(Exchange::Sse), "PRICE_ABOVE", 2000.0, "UP")
            .await
            .unwrap();

        repo.fire(rule.rule_id, "INFO", "price crossed threshold", json!({"price": 2005.0})).await.unwrap();
        let alerts = repo.list_recent(10).await.unwrap();
        assert_eq!(alerts.len(), 1);
    }
}
