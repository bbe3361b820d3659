//! Fundamental snapshot storage, keyed by report period/type per instrument.

use sqlx::{Row, SqlitePool};

use crate::domain::models::FundamentalSnapshot;
use crate::domain::types::Exchange;

pub struct FundamentalsRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FundamentalsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_many(&self, rows: &[FundamentalSnapshot]) -> anyhow::Result<u64> {
        let mut n = 0u64;
        for r in rows {
            sqlx::query(
                r#"
                INSERT INTO fundamentals (symbol, exchange, report_period, report_type, pe_ttm, pb, ps_ttm, market_value)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol, exchange, report_period, report_type) DO UPDATE SET
                    pe_ttm = excluded.pe_ttm,
                    pb = excluded.pb,
                    ps_ttm = excluded.ps_ttm,
                    market_value = excluded.market_value
                "#,
            )
            .bind(&r.symbol)
            .bind(r.exchange.to_string())
            .bind(&r.report_period)
            .bind(&r.report_type)
            .bind(r.pe_ttm)
            .bind(r.pb)
            .bind(r.ps_ttm)
            .bind(r.market_value)
            .execute(self.pool)
            .await?;
            n += 1;
        }
        Ok(n)
    }

    pub async fn latest(&self, symbol: &str, exchange: Exchange) -> anyhow::Result<Option<FundamentalSnapshot>> {
        let row = sqlx::query(
            "SELECT * FROM fundamentals WHERE symbol = ? AND exchange = ? ORDER BY report_period DESC LIMIT 1",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(|row| {
            let exchange: String = row.get("exchange");
            Ok(FundamentalSnapshot {
                symbol: row.get("symbol"),
                exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                report_period: row.get("report_period"),
                report_type: row.get("report_type"),
                pe_ttm: row.get("pe_ttm"),
                pb: row.get("pb"),
                ps_ttm: row.get("ps_ttm"),
                market_value: row.get("market_value"),
            })
        })
        .transpose()
    }
}
