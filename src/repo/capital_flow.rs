//! Daily capital-flow (northbound/main-inflow) storage.

use sqlx::{Row, SqlitePool};

use crate::domain::models::CapitalFlowDaily;
use crate::domain::types::Exchange;

pub struct CapitalFlowRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CapitalFlowRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_many(&self, rows: &[CapitalFlowDaily]) -> anyhow::Result<u64> {
        let mut n = 0u64;
        for r in rows {
            sqlx::query(
                r#"
                INSERT INTO capital_flow (symbol, exchange, trade_date, net_inflow, main_inflow, northbound_net)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol, exchange, trade_date) DO UPDATE SET
                    net_inflow = excluded.net_inflow,
                    main_inflow = excluded.main_inflow,
                    northbound_net = excluded.northbound_net
                "#,
            )
            .bind(&r.symbol)
            .bind(r.exchange.to_string())
            .bind(r.trade_date)
            .bind(r.net_inflow)
            .bind(r.main_inflow)
            .bind(r.northbound_net)
            .execute(self.pool)
            .await?;
            n += 1;
        }
        Ok(n)
    }

    pub async fn latest(&self, symbol: &str, exchange: Exchange) -> anyhow::Result<Option<CapitalFlowDaily>> {
        let row = sqlx::query(
            "SELECT * FROM capital_flow WHERE symbol = ? AND exchange = ? ORDER BY trade_date DESC LIMIT 1",
        )
        .bind(symbol)
        .bind(exchange.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(|row| {
            let exchange: String = row.get("exchange");
            Ok(CapitalFlowDaily {
                symbol: row.get("symbol"),
                exchange: exchange.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                trade_date: row.get("trade_date"),
                net_inflow: row.get("net_inflow"),
                main_inflow: row.get("main_inflow"),
                northbound_net: row.get("northbound_net"),
            })
        })
        .transpose()
    }
}
