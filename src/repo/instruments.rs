//! Instrument universe storage: upsert from provider ingestion, search for lookup.

use sqlx::{Row, SqlitePool};

use crate::domain::models::Instrument;
use crate::domain::ports::InstrumentRow;
use crate::domain::types::Exchange;

pub struct InstrumentsRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> InstrumentsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_many(&self, rows: &[InstrumentRow]) -> anyhow::Result<u64> {
        let mut n = 0u64;
        for r in rows {
            sqlx::query(
                r#"
                INSERT INTO instruments (symbol, exchange, market, name, industry, active)
                VALUES (?, ?, ?, ?, ?, 1)
                ON CONFLICT(symbol, exchange) DO UPDATE SET
                    market = excluded.market,
                    name = excluded.name,
                    industry = excluded.industry,
                    active = 1
                "#,
            )
            .bind(&r.symbol)
            .bind(r.exchange.to_string())
            .bind(&r.market)
            .bind(&r.name)
            .bind(&r.industry)
            .execute(self.pool)
            .await?;
            n += 1;
        }
        Ok(n)
    }

    pub async fn search(&self, query: &str, limit: i64) -> anyhow::Result<Vec<Instrument>> {
        let like = format!("%{query}%");
        let rows = sqlx::query(
            "SELECT symbol, exchange, market, name, industry, active FROM instruments \
             WHERE symbol LIKE ? OR name LIKE ? ORDER BY symbol LIMIT ?",
        )
        .bind(&like)
        .bind(&like)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let exchange: String = row.get("exchange");
                Ok(Instrument {
                    symbol: row.get("symbol"),
                    exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                    market: row.get("market"),
                    name: row.get("name"),
                    industry: row.get("industry"),
                    active: row.get::<i64, _>("active") != 0,
                })
            })
            .collect()
    }

    pub async fn get(&self, symbol: &str, exchange: Exchange) -> anyhow::Result<Option<Instrument>> {
        let row = sqlx::query(
            "SELECT symbol, exchange, market, name, industry, active FROM instruments \
             WHERE symbol = ? AND exchange = ?",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(|row| {
            let exchange: String = row.get("exchange");
            Ok(Instrument {
                symbol: row.get("symbol"),
                exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                market: row.get("market"),
                name: row.get("name"),
                industry: row.get("industry"),
                active: row.get::<i64, _>("active") != 0,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;

    #[tokio::test]
    async fn upsert_then_search_finds_by_symbol_or_name() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = InstrumentsRepo::new(&db.pool);

        repo.upsert_many(&[InstrumentRow {
            symbol: "600519".to_string(),
            exchange: Exchange::Sse,
            market: "CN_A".to_string(),
            name: "贵州茅台".to_string(),
            industry: Some("白酒".to_string()),
        }])
        .await
        .unwrap();

        let found = repo.search("600519", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "贵州茅台");
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = InstrumentsRepo::new(&db.pool);
        let row = InstrumentRow {
            symbol: "000001".to_string(),
            exchange: Exchange::Szse,
            market: "CN_A".to_string(),
            name: "平安银行".to_string(),
            industry: None,
        };
        repo.upsert_many(&[row.clone()]).await.unwrap();
        repo.upsert_many(&[row]).await.unwrap();

        let found = repo.search("000001", 10).await.unwrap();
        assert_eq!(found.len(), 1);
    }
}
