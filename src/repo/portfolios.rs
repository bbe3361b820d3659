//! Portfolio and position storage. Position quantities are adjusted in place by
//! the sim execution service; this repo only exposes plain CRUD primitives.

use chrono::Utc;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::models::{Portfolio, Position};
use crate::domain::types::Exchange;

pub struct PortfoliosRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PortfoliosRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, name: &str, base_currency: &str, cash: f64) -> anyhow::Result<Portfolio> {
        let portfolio_id = Uuid::new_v4();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO portfolios (portfolio_id, name, base_currency, cash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(portfolio_id.to_string())
        .bind(name)
        .bind(base_currency)
        .bind(cash)
        .bind(created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(Portfolio {
            portfolio_id,
            name: name.to_string(),
            base_currency: base_currency.to_string(),
            cash,
            created_at,
        })
    }

    pub async fn get(&self, portfolio_id: Uuid) -> anyhow::Result<Option<Portfolio>> {
        let row = sqlx::query("SELECT * FROM portfolios WHERE portfolio_id = ?")
            .bind(portfolio_id.to_string())
            .fetch_optional(self.pool)
            .await?;
        row.map(|row| {
            let portfolio_id: String = row.get("portfolio_id");
            let created_at: String = row.get("created_at");
            Ok(Portfolio {
                portfolio_id: Uuid::parse_str(&portfolio_id)?,
                name: row.get("name"),
                base_currency: row.get("base_currency"),
                cash: row.get("cash"),
                created_at: created_at.parse()?,
            })
        })
        .transpose()
    }

    pub async fn list(&self) -> anyhow::Result<Vec<Portfolio>> {
        let rows = sqlx::query("SELECT * FROM portfolios ORDER BY created_at ASC")
            .fetch_all(self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let portfolio_id: String = row.get("portfolio_id");
                let created_at: String = row.get("created_at");
                Ok(Portfolio {
                    portfolio_id: Uuid::parse_str(&portfolio_id)?,
                    name: row.get("name"),
                    base_currency: row.get("base_currency"),
                    cash: row.get("cash"),
                    created_at: created_at.parse()?,
                })
            })
            .collect()
    }

    pub async fn set_cash(&self, portfolio_id: Uuid, cash: f64) -> anyhow::Result<()> {
        sqlx::query("UPDATE portfolios SET cash = ? WHERE portfolio_id = ?")
            .bind(cash)
            .bind(portfolio_id.to_string())
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Same update as `set_cash`, run against a caller-owned transaction so it
    /// commits atomically alongside the fill that produced the new balance.
    pub async fn set_cash_in_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        portfolio_id: Uuid,
        cash: f64,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE portfolios SET cash = ? WHERE portfolio_id = ?")
            .bind(cash)
            .bind(portfolio_id.to_string())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn list_positions(&self, portfolio_id: Uuid) -> anyhow::Result<Vec<Position>> {
        let rows = sqlx::query("SELECT * FROM positions WHERE portfolio_id = ?")
            .bind(portfolio_id.to_string())
            .fetch_all(self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let portfolio_id: String = row.get("portfolio_id");
                let exchange: String = row.get("exchange");
                Ok(Position {
                    portfolio_id: Uuid::parse_str(&portfolio_id)?,
                    symbol: row.get("symbol"),
                    exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                    qty: row.get("qty"),
                    avg_cost: row.get("avg_cost"),
                })
            })
            .collect()
    }

    /// Applies a signed quantity delta (positive for buys, negative for sells)
    /// and recomputes the weighted-average cost on increases. Deletes the row
    /// if the resulting quantity is zero.
    pub async fn apply_fill(
        &self,
        portfolio_id: Uuid,
        symbol: &str,
        exchange: Exchange,
        qty_delta: i64,
        fill_price: f64,
    ) -> anyhow::Result<()> {
        let existing = sqlx::query("SELECT qty, avg_cost FROM positions WHERE portfolio_id = ? AND symbol = ? AND exchange = ?")
            .bind(portfolio_id.to_string())
            .bind(symbol)
            .bind(exchange.to_string())
            .fetch_optional(self.pool)
            .await?;

        let (old_qty, old_avg_cost): (i64, f64) = existing
            .map(|row| (row.get("qty"), row.get("avg_cost")))
            .unwrap_or((0, 0.0));

        let new_qty = old_qty + qty_delta;

        if new_qty == 0 {
            sqlx::query("DELETE FROM positions WHERE portfolio_id = ? AND symbol = ? AND exchange = ?")
                .bind(portfolio_id.to_string())
                .bind(symbol)
                .bind(exchange.to_string())
                .execute(self.pool)
                .await?;
            return Ok(());
        }

        let new_avg_cost = if qty_delta > 0 {
            let old_cost_basis = old_avg_cost * old_qty as f64;
            let new_cost_basis = fill_price * qty_delta as f64;
            (old_cost_basis + new_cost_basis) / new_qty as f64
        } else {
            old_avg_cost
        };

        sqlx::query(
            "INSERT INTO positions (portfolio_id, symbol, exchange, qty, avg_cost) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(portfolio_id, symbol, exchange) DO UPDATE SET qty = excluded.qty, avg_cost = excluded.avg_cost",
        )
        .bind(portfolio_id.to_string())
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(new_qty)
        .bind(new_avg_cost)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Same position update as `apply_fill`, run against a caller-owned
    /// transaction so a multi-leg fill's position and cash changes commit
    /// atomically alongside the order/trade rows that produced them.
    pub async fn apply_fill_in_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        portfolio_id: Uuid,
        symbol: &str,
        exchange: Exchange,
        qty_delta: i64,
        fill_price: f64,
    ) -> anyhow::Result<()> {
        let existing = sqlx::query("SELECT qty, avg_cost FROM positions WHERE portfolio_id = ? AND symbol = ? AND exchange = ?")
            .bind(portfolio_id.to_string())
            .bind(symbol)
            .bind(exchange.to_string())
            .fetch_optional(&mut **tx)
            .await?;

        let (old_qty, old_avg_cost): (i64, f64) = existing
            .map(|row| (row.get("qty"), row.get("avg_cost")))
            .unwrap_or((0, 0.0));

        let new_qty = old_qty + qty_delta;

        if new_qty == 0 {
            sqlx::query("DELETE FROM positions WHERE portfolio_id = ? AND symbol = ? AND exchange = ?")
                .bind(portfolio_id.to_string())
                .bind(symbol)
                .bind(exchange.to_string())
                .execute(&mut **tx)
                .await?;
            return Ok(());
        }

        let new_avg_cost = if qty_delta > 0 {
            let old_cost_basis = old_avg_cost * old_qty as f64;
            let new_cost_basis = fill_price * qty_delta as f64;
            (old_cost_basis + new_cost_basis) / new_qty as f64
        } else {
            old_avg_cost
        };

        sqlx::query(
            "INSERT INTO positions (portfolio_id, symbol, exchange, qty, avg_cost) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(portfolio_id, symbol, exchange) DO UPDATE SET qty = excluded.qty, avg_cost = excluded.avg_cost",
        )
        .bind(portfolio_id.to_string())
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(new_qty)
        .bind(new_avg_cost)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;

    #[tokio::test]
    async fn apply_fill_averages_cost_on_buys() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = PortfoliosRepo::new(&db.pool);
        let portfolio = repo.create("demo", "CNY", 100_000.0).await.unwrap();

        repo.apply_fill(portfolio.portfolio_id, "600519", Exchange::Sse, 100, 1700.0).await.unwrap();
        repo.apply_fill(portfolio.portfolio_id, "600519", Exchange::Sse, 100, 1800.0).await.unwrap();

        let positions = repo.list_positions(portfolio.portfolio_id).await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].qty, 200);
        assert_eq!(positions[0].avg_cost, 1750.0);
    }

    #[tokio::test]
    async fn apply_fill_removes_position_when_fully_sold() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = PortfoliosRepo::new(&db.pool);
        let portfolio = repo.create("demo", "CNY", 100_000.0).await.unwrap();

        repo.apply_fill(portfolio.portfolio_id, "600519", Exchange::Sse, 100, 1700.0).await.unwrap();
        repo.apply_fill(portfolio.portfolio_id, "600519", Exchange::Sse, -100, 1750.0).await.unwrap();

        let positions = repo.list_positions(portfolio.portfolio_id).await.unwrap();
        assert!(positions.is_empty());
    }
}
