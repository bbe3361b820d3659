//! Trade plan versioning: append-only rows per (symbol, exchange), monotonic `plan_version`.

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::TradePlan;
use crate::domain::types::Exchange;

pub struct PlansRepo<'a> {
    pool: &'a SqlitePool,
}

fn row_to_plan(row: sqlx::sqlite::SqliteRow) -> anyhow::Result<TradePlan> {
    let exchange: String = row.get("exchange");
    let plan_id: String = row.get("plan_id");
    let based_on: String = row.get("based_on_json");
    let created_at: String = row.get("created_at");
    Ok(TradePlan {
        plan_id: Uuid::parse_str(&plan_id)?,
        symbol: row.get("symbol"),
        exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        plan_version: row.get("plan_version"),
        entry_price: row.get("entry_price"),
        stop_loss: row.get("stop_loss"),
        take_profit: row.get("take_profit"),
        position_sizing: row.get("position_sizing"),
        based_on: serde_json::from_str(&based_on)?,
        created_at: created_at.parse()?,
    })
}

impl<'a> PlansRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    async fn next_version(&self, symbol: &str, exchange: Exchange) -> anyhow::Result<i64> {
        let row = sqlx::query(
            "SELECT MAX(plan_version) AS v FROM trade_plans WHERE symbol = ? AND exchange = ?",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .fetch_one(self.pool)
        .await?;
        let current: Option<i64> = row.get("v");
        Ok(current.unwrap_or(0) + 1)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        symbol: &str,
        exchange: Exchange,
        entry_price: Option<f64>,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
        position_sizing: Option<f64>,
        based_on: Value,
    ) -> anyhow::Result<TradePlan> {
        let plan_id = Uuid::new_v4();
        let created_at = Utc::now();
        let version = self.next_version(symbol, exchange).await?;

        sqlx::query(
            r#"
            INSERT INTO trade_plans (
                plan_id, symbol, exchange, plan_version,
                entry_price, stop_loss, take_profit, position_sizing,
                based_on_json, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(plan_id.to_string())
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(version)
        .bind(entry_price)
        .bind(stop_loss)
        .bind(take_profit)
        .bind(position_sizing)
        .bind(based_on.to_string())
        .bind(created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(TradePlan {
            plan_id,
            symbol: symbol.to_string(),
            exchange,
            plan_version: version,
            entry_price,
            stop_loss,
            take_profit,
            position_sizing,
            based_on,
            created_at,
        })
    }

    pub async fn latest(&self, symbol: &str, exchange: Exchange) -> anyhow::Result<Option<TradePlan>> {
        let row = sqlx::query(
            "SELECT * FROM trade_plans WHERE symbol = ? AND exchange = ? ORDER BY plan_version DESC LIMIT 1",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .fetch_optional(self.pool)
        .await?;
        row.map(row_to_plan).transpose()
    }

    pub async fn list(&self, symbol: &str, exchange: Exchange, limit: i64) -> anyhow::Result<Vec<TradePlan>> {
        let rows = sqlx::query(
            "SELECT * FROM trade_plans WHERE symbol = ? AND exchange = ? ORDER BY plan_version DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(row_to_plan).collect()
    }

    pub async fn get(&self, plan_id: Uuid) -> anyhow::Result<Option<TradePlan>> {
        let row = sqlx::query("SELECT * FROM trade_plans WHERE plan_id = ?")
            .bind(plan_id.to_string())
            .fetch_optional(self.pool)
            .await?;
        row.map(row_to_plan).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;
    use serde_json::json;

    #[tokio::test]
    async fn each_create_bumps_plan_version() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = PlansRepo::new(&db.pool);

        let first = repo
            .create("600519", Exchange::Sse, Some(1700.0), None, None, None, json!({}))
            .await
            .unwrap();
        let second = repo
            .create("600519", Exchange::Sse, Some(1750.0), None, None, None, json!({}))
            .await
            .unwrap();

        assert_eq!(first.plan_version, 1);
        assert_eq!(second.plan_version, 2);

        let latest = repo.latest("600519", Exchange::Sse).await.unwrap().unwrap();
        assert_eq!(latest.plan_id, second.plan_id);
    }
}
