//! Headline storage for symbol-scoped and market-wide news items.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::NewsItem;
use crate::domain::types::Exchange;

pub struct NewsRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> NewsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert(&self, item: &NewsItem) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO news_items (news_id, symbol, exchange, title, content, source, published_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(item.news_id.to_string())
        .bind(&item.symbol)
        .bind(item.exchange.map(|e| e.to_string()))
        .bind(&item.title)
        .bind(&item.content)
        .bind(&item.source)
        .bind(item.published_at.to_rfc3339())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_symbol(&self, symbol: &str, exchange: Exchange, limit: i64) -> anyhow::Result<Vec<NewsItem>> {
        let rows = sqlx::query(
            "SELECT * FROM news_items WHERE symbol = ? AND exchange = ? ORDER BY published_at DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let news_id: String = row.get("news_id");
                let exchange: Option<String> = row.get("exchange");
                let published_at: String = row.get("published_at");
                Ok(NewsItem {
                    news_id: Uuid::parse_str(&news_id)?,
                    symbol: row.get("symbol"),
                    exchange: exchange.map(|e| e.parse()).transpose().map_err(|e: String| anyhow::anyhow!(e))?,
                    title: row.get("title"),
                    content: row.get("content"),
                    source: row.get("source"),
                    published_at: published_at.parse()?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;
    use chrono::Utc;

    #[tokio::test]
    async fn insert_then_list_for_symbol_round_trips() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = NewsRepo::new(&db.pool);
        repo.insert(&NewsItem {
            news_id: Uuid::new_v4(),
            symbol: Some("600519".to_string()),
            exchange: Some(Exchange::Sse),
            title: "headline".to_string(),
            content: "body".to_string(),
            source: "wire".to_string(),
            published_at: Utc::now(),
        })
        .await
        .unwrap();

        let items = repo.list_for_symbol("600519", Exchange::Sse, 10).await.unwrap();
        assert_eq!(items.len(), 1);
    }
}
