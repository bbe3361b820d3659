//! Deterministic, seeded synthetic data provider.
//!
//! Ships no network calls and is always healthy, so it is the default first
//! entry in `WORKBENCH_PROVIDER_ORDER` and the backbone of integration tests
//! and demos that need reproducible bars without an external dependency.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::json;

use crate::domain::models::{CapitalFlowDaily, FundamentalSnapshot};
use crate::domain::ports::{BarDailyRow, DataProvider, InstrumentRow, ProviderStatus};
use crate::domain::types::{Adj, Exchange};

const UNIVERSE: &[(&str, &str)] = &[
    ("600519", "贵州茅台"),
    ("000001", "平安银行"),
    ("300750", "宁德时代"),
    ("601318", "中国平安"),
    ("000858", "五粮液"),
];

pub struct LocalProvider;

impl LocalProvider {
    pub fn new() -> Self {
        Self
    }

    /// A small xorshift-style hash so the same symbol always seeds the same walk.
    fn seed(symbol: &str) -> u64 {
        let mut h: u64 = 1469598103934665603;
        for b in symbol.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(1099511628211);
        }
        h
    }

    fn next_u64(state: &mut u64) -> u64 {
        *state ^= *state << 13;
        *state ^= *state >> 7;
        *state ^= *state << 17;
        *state
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn status(&self) -> ProviderStatus {
        ProviderStatus {
            ok: true,
            details: json!({"kind": "synthetic"}),
        }
    }

    async fn iter_instruments(&self) -> anyhow::Result<Vec<InstrumentRow>> {
        Ok(UNIVERSE
            .iter()
            .map(|(symbol, name)| InstrumentRow {
                symbol: symbol.to_string(),
                exchange: Exchange::infer_from_symbol(symbol),
                market: "CN_A".to_string(),
                name: name.to_string(),
                industry: None,
            })
            .collect())
    }

    async fn fetch_bars_daily(
        &self,
        symbol: &str,
        exchange: Exchange,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        adj: Adj,
    ) -> anyhow::Result<Vec<BarDailyRow>> {
        let end = end_date.unwrap_or_else(|| Utc::now().date_naive());
        let start = start_date.unwrap_or(end - Duration::days(180));

        let mut state = Self::seed(symbol).max(1);
        let mut price = 10.0 + (state % 200) as f64;
        let mut rows = Vec::new();
        let mut date = start;
        let mut pre_close: Option<f64> = None;

        while date <= end {
            let weekday = date.format("%u").to_string();
            if weekday == "6" || weekday == "7" {
                date += Duration::days(1);
                continue;
            }

            let r = Self::next_u64(&mut state);
            let step = ((r % 2001) as f64 - 1000.0) / 1000.0 * 0.02;
            price = (price * (1.0 + step)).max(1.0);

            let open = pre_close.unwrap_or(price);
            let high = open.max(price) * 1.005;
            let low = open.min(price) * 0.995;
            let volume = 1_000_000.0 + (r % 500_000) as f64;
            let amount = volume * price;

            rows.push(BarDailyRow {
                symbol: symbol.to_string(),
                exchange,
                trade_date: date,
                adj,
                open,
                high,
                low,
                close: price,
                volume,
                amount,
                pre_close,
            });

            pre_close = Some(price);
            date += Duration::days(1);
        }

        Ok(rows)
    }

    async fn fetch_fundamentals_daily(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> anyhow::Result<Vec<FundamentalSnapshot>> {
        let seed = Self::seed(symbol);
        Ok(vec![FundamentalSnapshot {
            symbol: symbol.to_string(),
            exchange,
            report_period: "2025Q4".to_string(),
            report_type: "ANNUAL".to_string(),
            pe_ttm: Some(10.0 + (seed % 40) as f64),
            pb: Some(1.0 + (seed % 10) as f64 / 2.0),
            ps_ttm: Some(2.0 + (seed % 8) as f64),
            market_value: Some(1.0e9 + (seed % 1_000_000_000) as f64),
        }])
    }

    async fn fetch_capital_flow_daily(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> anyhow::Result<Vec<CapitalFlowDaily>> {
        let end = Utc::now().date_naive();
        let seed = Self::seed(symbol);
        Ok(vec![CapitalFlowDaily {
            symbol: symbol.to_string(),
            exchange,
            trade_date: end,
            net_inflow: Some((seed % 1_000_000) as f64 - 500_000.0),
            main_inflow: Some((seed % 500_000) as f64 - 250_000.0),
            northbound_net: Some((seed % 200_000) as f64 - 100_000.0),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_provider_is_always_healthy() {
        let provider = LocalProvider::new();
        assert!(provider.status().await.ok);
    }

    #[tokio::test]
    async fn bars_are_deterministic_for_the_same_symbol() {
        let provider = LocalProvider::new();
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();

        let first = provider
            .fetch_bars_daily("600519", Exchange::Sse, Some(start), Some(end), Adj::Qfq)
            .await
            .unwrap();
        let second = provider
            .fetch_bars_daily("600519", Exchange::Sse, Some(start), Some(end), Adj::Qfq)
            .await
            .unwrap();

        assert_eq!(first.len(), second.len());
        assert!(!first.is_empty());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.close, b.close);
            assert_eq!(a.trade_date, b.trade_date);
        }
    }

    #[tokio::test]
    async fn iter_instruments_covers_the_seeded_universe() {
        let provider = LocalProvider::new();
        let instruments = provider.iter_instruments().await.unwrap();
        assert_eq!(instruments.len(), UNIVERSE.len());
    }
}
