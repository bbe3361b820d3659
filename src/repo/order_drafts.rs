//! Proposed, not-yet-executed order drafts (origin: "rebalance" | "manual").

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::OrderDraft;
use crate::domain::types::{Exchange, Side};

pub struct OrderDraftsRepo<'a> {
    pool: &'a SqlitePool,
}

fn row_to_draft(row: sqlx::sqlite::SqliteRow) -> anyhow::Result<OrderDraft> {
    let draft_id: String = row.get("draft_id");
    let portfolio_id: String = row.get("portfolio_id");
    let exchange: String = row.get("exchange");
    let side: String = row.get("side");
    let created_at: String = row.get("created_at");
    Ok(OrderDraft {
        draft_id: Uuid::parse_str(&draft_id)?,
        portfolio_id: Uuid::parse_str(&portfolio_id)?,
        symbol: row.get("symbol"),
        exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        side: side.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        order_type: row.get("order_type"),
        price: row.get("price"),
        qty: row.get("qty"),
        origin: row.get("origin"),
        created_at: created_at.parse()?,
    })
}

impl<'a> OrderDraftsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        portfolio_id: Uuid,
        symbol: &str,
        exchange: Exchange,
        side: Side,
        order_type: &str,
        price: Option<f64>,
        qty: i64,
        origin: &str,
    ) -> anyhow::Result<OrderDraft> {
        let draft_id = Uuid::new_v4();
        let created_at = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO order_drafts (draft_id, portfolio_id, symbol, exchange, side, order_type, price, qty, origin, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(draft_id.to_string())
        .bind(portfolio_id.to_string())
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(side.to_string())
        .bind(order_type)
        .bind(price)
        .bind(qty)
        .bind(origin)
        .bind(created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(OrderDraft {
            draft_id,
            portfolio_id,
            symbol: symbol.to_string(),
            exchange,
            side,
            order_type: order_type.to_string(),
            price,
            qty,
            origin: origin.to_string(),
            created_at,
        })
    }

    pub async fn get(&self, draft_id: Uuid) -> anyhow::Result<Option<OrderDraft>> {
        let row = sqlx::query("SELECT * FROM order_drafts WHERE draft_id = ?")
            .bind(draft_id.to_string())
            .fetch_optional(self.pool)
            .await?;
        row.map(row_to_draft).transpose()
    }

    pub async fn update(&self, draft_id: Uuid, price: Option<f64>, qty: i64) -> anyhow::Result<Option<OrderDraft>> {
        sqlx::query("UPDATE order_drafts SET price = ?, qty = ? WHERE draft_id = ?")
            .bind(price)
            .bind(qty)
            .bind(draft_id.to_string())
            .execute(self.pool)
            .await?;
        self.get(draft_id).await
    }

    pub async fn delete(&self, draft_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM order_drafts WHERE draft_id = ?")
            .bind(draft_id.to_string())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_many(&self, draft_ids: &[Uuid]) -> anyhow::Result<Vec<OrderDraft>> {
        let mut out = Vec::with_capacity(draft_ids.len());
        for id in draft_ids {
            if let Some(row) = sqlx::query("SELECT * FROM order_drafts WHERE draft_id = ?")
                .bind(id.to_string())
                .fetch_optional(self.pool)
                .await?
            {
                out.push(row_to_draft(row)?);
            }
        }
        Ok(out)
    }

    pub async fn list_for_portfolio(&self, portfolio_id: Uuid, limit: i64) -> anyhow::Result<Vec<OrderDraft>> {
        let rows = sqlx::query(
            "SELECT * FROM order_drafts WHERE portfolio_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(portfolio_id.to_string())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(row_to_draft).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;
    use crate::repo::portfolios::PortfoliosRepo;

    #[tokio::test]
    async fn create_then_get_many_round_trips() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let portfolio = portfolios.create("demo", "CNY", 100_000.0).await.unwrap();

        let repo = OrderDraftsRepo::new(&db.pool);
        let draft = repo
            .create(portfolio.portfolio_id, "600519", Exchange::Sse, Side::Buy, "MARKET", Some(1700.0), 100, "rebalance")
            .await
            .unwrap();

        let fetched = repo.get_many(&[draft.draft_id]).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].qty, 100);
    }

    #[tokio::test]
    async fn update_then_delete_round_trips() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let portfolio = portfolios.create("demo", "CNY", 100_000.0).await.unwrap();

        let repo = OrderDraftsRepo::new(&db.pool);
        let draft = repo
            .create(portfolio.portfolio_id, "600519", Exchange::Sse, Side::Buy, "MARKET", None, 100, "manual")
            .await
            .unwrap();

        let updated = repo.update(draft.draft_id, Some(1750.0), 200).await.unwrap().unwrap();
        assert_eq!(updated.qty, 200);
        assert_eq!(updated.price, Some(1750.0));

        assert!(repo.delete(draft.draft_id).await.unwrap());
        assert!(repo.get(draft.draft_id).await.unwrap().is_none());
    }
}
