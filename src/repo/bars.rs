//! Daily bar storage: upsert from provider ingestion, range queries for scoring/planning.

use chrono::{NaiveDate, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::models::BarDaily;
use crate::domain::ports::BarDailyRow;
use crate::domain::types::{Adj, Exchange};

pub struct BarsRepo<'a> {
    pool: &'a SqlitePool,
}

fn row_to_bar(row: sqlx::sqlite::SqliteRow) -> anyhow::Result<BarDaily> {
    let exchange: String = row.get("exchange");
    let adj: String = row.get("adj");
    let ingested_at: String = row.get("ingested_at");
    Ok(BarDaily {
        symbol: row.get("symbol"),
        exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        trade_date: row.get("trade_date"),
        adj: adj.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        open: row.get("open"),
        high: row.get("high"),
        low: row.get("low"),
        close: row.get("close"),
        volume: row.get("volume"),
        amount: row.get("amount"),
        pre_close: row.get("pre_close"),
        source: row.get("source"),
        quality: row.get("quality"),
        ingested_at: ingested_at.parse()?,
    })
}

impl<'a> BarsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_many(&self, rows: &[BarDailyRow], source: &str) -> anyhow::Result<u64> {
        let now = Utc::now().to_rfc3339();
        let mut n = 0u64;
        for r in rows {
            sqlx::query(
                r#"
                INSERT INTO bars_daily (
                    symbol, exchange, trade_date, adj,
                    open, high, low, close, volume, amount, pre_close,
                    source, quality, ingested_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol, exchange, trade_date, adj) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume,
                    amount = excluded.amount,
                    pre_close = excluded.pre_close,
                    source = excluded.source,
                    quality = excluded.quality,
                    ingested_at = excluded.ingested_at
                "#,
            )
            .bind(&r.symbol)
            .bind(r.exchange.to_string())
            .bind(r.trade_date)
            .bind(r.adj.to_string())
            .bind(r.open)
            .bind(r.high)
            .bind(r.low)
            .bind(r.close)
            .bind(r.volume)
            .bind(r.amount)
            .bind(r.pre_close)
            .bind(source)
            .bind("OK")
            .bind(&now)
            .execute(self.pool)
            .await?;
            n += 1;
        }
        Ok(n)
    }

    /// Most recent `limit` bars, ordered oldest-first for charting and indicator math.
    pub async fn list_recent(
        &self,
        symbol: &str,
        exchange: Exchange,
        adj: Adj,
        limit: i64,
    ) -> anyhow::Result<Vec<BarDaily>> {
        let rows = sqlx::query(
            "SELECT * FROM (SELECT * FROM bars_daily WHERE symbol = ? AND exchange = ? AND adj = ? \
             ORDER BY trade_date DESC LIMIT ?) ORDER BY trade_date ASC",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(adj.to_string())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(row_to_bar).collect()
    }

    pub async fn list_range(
        &self,
        symbol: &str,
        exchange: Exchange,
        adj: Adj,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> anyhow::Result<Vec<BarDaily>> {
        let rows = sqlx::query(
            "SELECT * FROM bars_daily WHERE symbol = ? AND exchange = ? AND adj = ? \
             AND trade_date BETWEEN ? AND ? ORDER BY trade_date ASC",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(adj.to_string())
        .bind(start_date)
        .bind(end_date)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(row_to_bar).collect()
    }

    pub async fn latest_close(&self, symbol: &str, exchange: Exchange, adj: Adj) -> anyhow::Result<Option<f64>> {
        let row = sqlx::query(
            "SELECT close FROM bars_daily WHERE symbol = ? AND exchange = ? AND adj = ? \
             ORDER BY trade_date DESC LIMIT 1",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .bind(adj.to_string())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|r| r.get("close")))
    }

    pub async fn latest_ingested_at(&self) -> anyhow::Result<Option<String>> {
        let row = sqlx::query("SELECT MAX(ingested_at) AS m FROM bars_daily")
            .fetch_one(self.pool)
            .await?;
        Ok(row.get("m"))
    }
}
