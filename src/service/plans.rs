//! Heuristic trade plan generator: turns the latest close + score into a minimal,
//! editable entry/stop/target plan (V1). Callers are expected to edit before execution.

use crate::domain::models::TradePlan;
use crate::domain::types::{Adj, Exchange};
use crate::errors::AppError;
use crate::repo::bars::BarsRepo;
use crate::repo::plans::PlansRepo;
use crate::repo::scores::ScoresRepo;
use crate::service::scoring;

const RECENT_BARS: i64 = 60;

pub async fn generate(
    bars_repo: &BarsRepo<'_>,
    scores: &ScoresRepo<'_>,
    plans: &PlansRepo<'_>,
    symbol: &str,
    exchange: Exchange,
) -> Result<TradePlan, AppError> {
    let bars = bars_repo.list_recent(symbol, exchange, Adj::Qfq, RECENT_BARS).await?;
    if bars.is_empty() {
        return Err(AppError::data_not_ready(
            format!("no bars ingested for {symbol}.{exchange}"),
            "ingest_bars_daily",
        ));
    }

    let score = match scores.latest(symbol, exchange).await? {
        Some(score) => score,
        None => {
            let outcome = scoring::score(&bars)?;
            let trade_date = bars.last().expect("checked non-empty above").trade_date;
            scores
                .insert(
                    symbol,
                    exchange,
                    trade_date,
                    outcome.score_total,
                    outcome.breakdown,
                    outcome.reasons,
                    scoring::RULESET_VERSION,
                    outcome.data_version,
                )
                .await?
        }
    };

    let last_close = bars.last().expect("checked non-empty above").close;
    let entry_price = last_close;
    let stop_loss = last_close * 0.95;
    let take_profit = last_close * 1.10;
    let position_sizing = (score.score_total / 100.0 * 0.25).clamp(0.05, 0.25);

    let based_on = serde_json::json!({
        "score_id": score.score_id,
        "score_ruleset": score.ruleset_version,
        "trade_date": score.trade_date,
    });

    plans
        .create(symbol, exchange, Some(entry_price), Some(stop_loss), Some(take_profit), Some(position_sizing), based_on)
        .await
        .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::BarDailyRow;
    use crate::infrastructure::persistence::Database;
    use chrono::NaiveDate;

    async fn seed_bars(bars: &BarsRepo<'_>, symbol: &str, exchange: Exchange) {
        let rows: Vec<BarDailyRow> = (0..60)
            .map(|i| BarDailyRow {
                symbol: symbol.to_string(),
                exchange,
                trade_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + chrono::Duration::days(i),
                adj: Adj::Qfq,
                open: 10.0,
                high: 10.5,
                low: 9.5,
                close: 10.0 + i as f64 * 0.01,
                volume: 1_000_000.0,
                amount: 10_000_000.0,
                pre_close: Some(10.0),
            })
            .collect();
        bars.upsert_many(&rows, "local").await.unwrap();
    }

    #[tokio::test]
    async fn generates_a_plan_and_persists_it() {
        let db = Database::new_in_memory().await.unwrap();
        let bars_repo = BarsRepo::new(&db.pool);
        let scores = ScoresRepo::new(&db.pool);
        let plans = PlansRepo::new(&db.pool);
        seed_bars(&bars_repo, "600519", Exchange::Sse).await;

        let plan = generate(&bars_repo, &scores, &plans, "600519", Exchange::Sse).await.unwrap();
        assert_eq!(plan.plan_version, 1);
        assert!(plan.entry_price.unwrap() > 0.0);
        assert!(plan.position_sizing.unwrap() >= 0.05 && plan.position_sizing.unwrap() <= 0.25);
    }

    #[tokio::test]
    async fn second_generate_increments_plan_version() {
        let db = Database::new_in_memory().await.unwrap();
        let bars_repo = BarsRepo::new(&db.pool);
        let scores = ScoresRepo::new(&db.pool);
        let plans = PlansRepo::new(&db.pool);
        seed_bars(&bars_repo, "600519", Exchange::Sse).await;

        generate(&bars_repo, &scores, &plans, "600519", Exchange::Sse).await.unwrap();
        let second = generate(&bars_repo, &scores, &plans, "600519", Exchange::Sse).await.unwrap();
        assert_eq!(second.plan_version, 2);
    }

    #[tokio::test]
    async fn no_bars_is_data_not_ready() {
        let db = Database::new_in_memory().await.unwrap();
        let bars_repo = BarsRepo::new(&db.pool);
        let scores = ScoresRepo::new(&db.pool);
        let plans = PlansRepo::new(&db.pool);

        let err = generate(&bars_repo, &scores, &plans, "000001", Exchange::Szse).await.unwrap_err();
        assert!(matches!(err, AppError::DataNotReady { .. }));
    }
}
