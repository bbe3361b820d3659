//! Workspace aggregator: the single read-side projection backing the symbol detail view.

use serde::Serialize;

use crate::domain::models::{CapitalFlowDaily, FundamentalSnapshot, Note, NewsItem, ScoreSnapshot, TradePlan};
use crate::domain::types::{Adj, Exchange};
use crate::errors::AppError;
use crate::repo::bars::BarsRepo;
use crate::repo::capital_flow::CapitalFlowRepo;
use crate::repo::fundamentals::FundamentalsRepo;
use crate::repo::news::NewsRepo;
use crate::repo::notes::NotesRepo;
use crate::repo::plans::PlansRepo;
use crate::repo::scores::ScoresRepo;
use crate::service::indicators::{self, Indicators};

const RECENT_BARS: i64 = 400;
const RECENT_NOTES: i64 = 20;
const RECENT_NEWS: i64 = 50;

#[derive(Debug, Clone, Serialize)]
pub struct Workspace {
    pub price_bars: Vec<crate::domain::models::BarDaily>,
    pub indicators: Indicators,
    pub fundamentals_summary: Option<FundamentalSnapshot>,
    pub capital_flow: Option<CapitalFlowDaily>,
    pub news: Vec<NewsItem>,
    pub latest_score: Option<ScoreSnapshot>,
    pub latest_plan: Option<TradePlan>,
    pub notes: Vec<Note>,
    pub data_version: serde_json::Value,
}

#[allow(clippy::too_many_arguments)]
pub async fn get_workspace(
    bars_repo: &BarsRepo<'_>,
    fundamentals: &FundamentalsRepo<'_>,
    capital_flow: &CapitalFlowRepo<'_>,
    scores: &ScoresRepo<'_>,
    plans: &PlansRepo<'_>,
    notes: &NotesRepo<'_>,
    news: &NewsRepo<'_>,
    symbol: &str,
    exchange: Exchange,
    adj: Adj,
) -> Result<Workspace, AppError> {
    let price_bars = bars_repo.list_recent(symbol, exchange, adj, RECENT_BARS).await?;
    if price_bars.is_empty() {
        return Err(AppError::data_not_ready(
            format!("no bars ingested for {symbol}.{exchange}"),
            "ingest_bars_daily",
        ));
    }

    let bars_ingested_at = bars_repo.latest_ingested_at().await?;
    let computed_indicators = indicators::compute(&price_bars);

    let fundamentals_summary = fundamentals.latest(symbol, exchange).await?;
    let capital_flow_latest = capital_flow.latest(symbol, exchange).await?;
    let latest_score = scores.latest(symbol, exchange).await?;
    let latest_plan = plans.latest(symbol, exchange).await?;
    let recent_notes = notes.list(symbol, exchange, RECENT_NOTES).await?;
    let recent_news = news.list_for_symbol(symbol, exchange, RECENT_NEWS).await?;

    Ok(Workspace {
        price_bars,
        indicators: computed_indicators,
        fundamentals_summary,
        capital_flow: capital_flow_latest,
        news: recent_news,
        latest_score,
        latest_plan,
        notes: recent_notes,
        data_version: serde_json::json!({ "bars_ingested_at": bars_ingested_at }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::BarDailyRow;
    use crate::infrastructure::persistence::Database;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn empty_bars_is_not_ready() {
        let db = Database::new_in_memory().await.unwrap();
        let bars = BarsRepo::new(&db.pool);
        let fundamentals = FundamentalsRepo::new(&db.pool);
        let capital_flow = CapitalFlowRepo::new(&db.pool);
        let scores = ScoresRepo::new(&db.pool);
        let plans = PlansRepo::new(&db.pool);
        let notes = NotesRepo::new(&db.pool);
        let news = NewsRepo::new(&db.pool);

        let result = get_workspace(&bars, &fundamentals, &capital_flow, &scores, &plans, &notes, &news, "600519", Exchange::Sse, Adj::Qfq).await;
        assert!(matches!(result, Err(AppError::DataNotReady { .. })));
    }

    #[tokio::test]
    async fn assembles_projection_from_seeded_bars() {
        let db = Database::new_in_memory().await.unwrap();
        let bars = BarsRepo::new(&db.pool);
        let fundamentals = FundamentalsRepo::new(&db.pool);
        let capital_flow = CapitalFlowRepo::new(&db.pool);
        let scores = ScoresRepo::new(&db.pool);
        let plans = PlansRepo::new(&db.pool);
        let notes = NotesRepo::new(&db.pool);
        let news = NewsRepo::new(&db.pool);

        bars.upsert_many(
            &[BarDailyRow {
                symbol: "600519".to_string(),
                exchange: Exchange::Sse,
                trade_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                adj: Adj::Qfq,
                open: 1000.0,
                high: 1010.0,
                low: 990.0,
                close: 1005.0,
                volume: 1_000_000.0,
                amount: 1_000_000_000.0,
                pre_close: Some(1000.0),
            }],
            "local",
        )
        .await
        .unwrap();

        let workspace = get_workspace(&bars, &fundamentals, &capital_flow, &scores, &plans, &notes, &news, "600519", Exchange::Sse, Adj::Qfq)
            .await
            .unwrap();

        assert_eq!(workspace.price_bars.len(), 1);
        assert!(workspace.latest_score.is_none());
    }
}
