//! Named watchlists: a simple membership table, grouped by an arbitrary list name.

use sqlx::{Row, SqlitePool};

use crate::domain::models::WatchlistItem;
use crate::domain::types::Exchange;

pub struct WatchlistsRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WatchlistsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, watchlist: &str, symbol: &str, exchange: Exchange) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO watchlist_items (watchlist, symbol, exchange) VALUES (?, ?, ?) \
             ON CONFLICT(watchlist, symbol, exchange) DO NOTHING",
        )
        .bind(watchlist)
        .bind(symbol)
        .bind(exchange.to_string())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove(&self, watchlist: &str, symbol: &str, exchange: Exchange) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM watchlist_items WHERE watchlist = ? AND symbol = ? AND exchange = ?")
            .bind(watchlist)
            .bind(symbol)
            .bind(exchange.to_string())
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn list(&self, watchlist: &str) -> anyhow::Result<Vec<WatchlistItem>> {
        let rows = sqlx::query("SELECT * FROM watchlist_items WHERE watchlist = ? ORDER BY symbol")
            .bind(watchlist)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let exchange: String = row.get("exchange");
                Ok(WatchlistItem {
                    watchlist: row.get("watchlist"),
                    symbol: row.get("symbol"),
                    exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                })
            })
            .collect()
    }
}
