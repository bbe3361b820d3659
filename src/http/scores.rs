use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::domain::models::ScoreSnapshot;
use crate::domain::types::{Adj, Exchange};
use crate::errors::AppError;
use crate::http::envelope::Created;
use crate::http::state::AppState;
use crate::repo::bars::BarsRepo;
use crate::repo::scores::ScoresRepo;
use crate::service::scoring;

#[derive(Deserialize)]
pub struct CalcRequest {
    symbol: String,
    exchange: Exchange,
}

const RECENT_BARS: i64 = 400;

pub async fn calc(State(state): State<AppState>, Json(req): Json<CalcRequest>) -> Result<Created<ScoreSnapshot>, AppError> {
    let bars_repo = BarsRepo::new(&state.pool);
    let bars = bars_repo.list_recent(&req.symbol, req.exchange, Adj::Qfq, RECENT_BARS).await?;
    if bars.is_empty() {
        return Err(AppError::data_not_ready(
            format!("no bars ingested for {}.{}", req.symbol, req.exchange),
            "ingest_bars_daily",
        ));
    }

    let outcome = scoring::score(&bars)?;
    let trade_date = bars.last().expect("checked non-empty above").trade_date;

    let snapshot = ScoresRepo::new(&state.pool)
        .insert(
            &req.symbol,
            req.exchange,
            trade_date,
            outcome.score_total,
            outcome.breakdown,
            outcome.reasons,
            scoring::RULESET_VERSION,
            outcome.data_version,
        )
        .await?;

    Ok(Created(snapshot))
}
