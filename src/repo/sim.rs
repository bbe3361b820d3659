//! Simulated fill ledger: one `SimOrder` aggregate plus its `SimTrade` legs per confirm.

use chrono::Utc;
use sqlx::{Row, SqlitePool, Sqlite, Transaction};
use uuid::Uuid;

use crate::domain::models::{SimOrder, SimTrade};
use crate::domain::types::{Exchange, Side};

pub struct SimRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SimRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.pool
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_order(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        portfolio_id: Uuid,
        draft_ids: Vec<Uuid>,
        filled_qty: i64,
        avg_fill_price: f64,
        fee_total: f64,
        slippage_total: f64,
    ) -> anyhow::Result<SimOrder> {
        let order_id = Uuid::new_v4();
        let filled_at = Utc::now();
        let draft_id_strings: Vec<String> = draft_ids.iter().map(Uuid::to_string).collect();

        sqlx::query(
            r#"
            INSERT INTO sim_orders (order_id, portfolio_id, status, draft_ids_json, filled_qty, avg_fill_price, fee_total, slippage_total, filled_at)
            VALUES (?, ?, 'FILLED', ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order_id.to_string())
        .bind(portfolio_id.to_string())
        .bind(serde_json::to_string(&draft_id_strings)?)
        .bind(filled_qty)
        .bind(avg_fill_price)
        .bind(fee_total)
        .bind(slippage_total)
        .bind(filled_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;

        Ok(SimOrder {
            order_id,
            portfolio_id,
            status: "FILLED".to_string(),
            draft_ids,
            filled_qty,
            avg_fill_price,
            fee_total,
            slippage_total,
            filled_at,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_trade(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: Uuid,
        portfolio_id: Uuid,
        draft_id: Uuid,
        symbol: &str,
        exchange: Exchange,
        side: Side,
        qty: i64,
        fill_price: f64,
        fee: f64,
        slippage: f64,
    ) -> anyhow::Result<SimTrade> {
        let trade_id = Uuid::new_v4();
        let filled_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sim_trades (trade_id, order_id, portfolio_id, draft_id, symbol, exchange, side, qty, fill_price, fee, slippage, filled_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trade_id.to_string())
        .bind(order_id.to_string())
        .bind(portfolio_id.to_string())
        .bind(draft_id.to_string())
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(side.to_string())
        .bind(qty)
        .bind(fill_price)
        .bind(fee)
        .bind(slippage)
        .bind(filled_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;

        Ok(SimTrade {
            trade_id,
            order_id,
            portfolio_id,
            draft_id,
            symbol: symbol.to_string(),
            exchange,
            side,
            qty,
            fill_price,
            fee,
            slippage,
            filled_at,
        })
    }

    pub async fn list_orders_for_portfolio(&self, portfolio_id: Uuid, limit: i64) -> anyhow::Result<Vec<SimOrder>> {
        let rows = sqlx::query(
            "SELECT * FROM sim_orders WHERE portfolio_id = ? ORDER BY filled_at DESC LIMIT ?",
        )
        .bind(portfolio_id.to_string())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let order_id: String = row.get("order_id");
                let portfolio_id: String = row.get("portfolio_id");
                let draft_ids: String = row.get("draft_ids_json");
                let filled_at: String = row.get("filled_at");
                let draft_ids: Vec<String> = serde_json::from_str(&draft_ids)?;
                Ok(SimOrder {
                    order_id: Uuid::parse_str(&order_id)?,
                    portfolio_id: Uuid::parse_str(&portfolio_id)?,
                    status: row.get("status"),
                    draft_ids: draft_ids.iter().map(|s| Uuid::parse_str(s)).collect::<Result<_, _>>()?,
                    filled_qty: row.get("filled_qty"),
                    avg_fill_price: row.get("avg_fill_price"),
                    fee_total: row.get("fee_total"),
                    slippage_total: row.get("slippage_total"),
                    filled_at: filled_at.parse()?,
                })
            })
            .collect()
    }

    pub async fn list_trades_for_portfolio(&self, portfolio_id: Uuid, limit: i64) -> anyhow::Result<Vec<SimTrade>> {
        let rows = sqlx::query(
            "SELECT * FROM sim_trades WHERE portfolio_id = ? ORDER BY filled_at DESC LIMIT ?",
        )
        .bind(portfolio_id.to_string())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let trade_id: String = row.get("trade_id");
                let order_id: String = row.get("order_id");
                let portfolio_id: String = row.get("portfolio_id");
                let draft_id: String = row.get("draft_id");
                let exchange: String = row.get("exchange");
                let side: String = row.get("side");
                let filled_at: String = row.get("filled_at");
                Ok(SimTrade {
                    trade_id: Uuid::parse_str(&trade_id)?,
                    order_id: Uuid::parse_str(&order_id)?,
                    portfolio_id: Uuid::parse_str(&portfolio_id)?,
                    draft_id: Uuid::parse_str(&draft_id)?,
                    symbol: row.get("symbol"),
                    exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                    side: side.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                    qty: row.get("qty"),
                    fill_price: row.get("fill_price"),
                    fee: row.get("fee"),
                    slippage: row.get("slippage"),
                    filled_at: filled_at.parse()?,
                })
            })
            .collect()
    }

    /// Sum of today's traded notional for a symbol within one portfolio, used
    /// by the daily-value-limit check.
    pub async fn traded_value_since(
        &self,
        portfolio_id: Uuid,
        symbol: &str,
        exchange: Exchange,
        since_rfc3339: &str,
    ) -> anyhow::Result<f64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(fill_price * qty), 0.0) AS v FROM sim_trades \
             WHERE portfolio_id = ? AND symbol = ? AND exchange = ? AND filled_at >= ?",
        )
        .bind(portfolio_id.to_string())
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(since_rfc3339)
        .fetch_one(self.pool)
        .await?;
        Ok(row.get("v"))
    }

    pub async fn last_trade_at(&self, portfolio_id: Uuid, symbol: &str, exchange: Exchange) -> anyhow::Result<Option<String>> {
        let row = sqlx::query(
            "SELECT MAX(filled_at) AS m FROM sim_trades WHERE portfolio_id = ? AND symbol = ? AND exchange = ?",
        )
        .bind(portfolio_id.to_string())
        .bind(symbol)
        .bind(exchange.to_string())
        .fetch_one(self.pool)
        .await?;
        Ok(row.get("m"))
    }

    /// Count of confirmed fills for a portfolio on/after a timestamp, used by
    /// the max-orders-per-day risk check (counts executions, not drafts).
    pub async fn orders_since(&self, portfolio_id: Uuid, since_rfc3339: &str) -> anyhow::Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS c FROM sim_orders WHERE portfolio_id = ? AND filled_at >= ?",
        )
        .bind(portfolio_id.to_string())
        .bind(since_rfc3339)
        .fetch_one(self.pool)
        .await?;
        Ok(row.get("c"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;

    #[tokio::test]
    async fn insert_order_and_trade_commit_together() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = SimRepo::new(&db.pool);
        let portfolio_id = Uuid::new_v4();
        let draft_id = Uuid::new_v4();

        let mut tx = db.pool.begin().await.unwrap();
        let order = repo
            .insert_order(&mut tx, portfolio_id, vec![draft_id], 100, 1700.0, 5.0, 2.0)
            .await
            .unwrap();
        repo.insert_trade(
            &mut tx,
            order.order_id,
            portfolio_id,
            draft_id,
            "600519",
            Exchange::Sse,
            Side::Buy,
            100,
            1700.0,
            5.0,
            2.0,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let trades = repo.list_trades_for_portfolio(portfolio_id, 10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].qty, 100);
    }
}
