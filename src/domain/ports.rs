use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::models::{CapitalFlowDaily, FundamentalSnapshot};
use super::types::{Adj, Exchange};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentRow {
    pub symbol: String,
    pub exchange: Exchange,
    pub market: String,
    pub name: String,
    pub industry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarDailyRow {
    pub symbol: String,
    pub exchange: Exchange,
    pub trade_date: NaiveDate,
    pub adj: Adj,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
    pub pre_close: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub ok: bool,
    pub details: Value,
}

/// Capability-set contract for a market data source, expressed as a trait so the
/// registry can hold heterogeneous implementations chosen by name.
#[async_trait]
pub trait DataProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn status(&self) -> ProviderStatus;

    async fn iter_instruments(&self) -> anyhow::Result<Vec<InstrumentRow>>;

    async fn fetch_bars_daily(
        &self,
        symbol: &str,
        exchange: Exchange,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        adj: Adj,
    ) -> anyhow::Result<Vec<BarDailyRow>>;

    async fn fetch_fundamentals_daily(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> anyhow::Result<Vec<FundamentalSnapshot>>;

    async fn fetch_capital_flow_daily(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> anyhow::Result<Vec<CapitalFlowDaily>>;
}
