use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::domain::models::TradePlan;
use crate::domain::types::Exchange;
use crate::errors::AppError;
use crate::http::envelope::Created;
use crate::http::state::AppState;
use crate::repo::bars::BarsRepo;
use crate::repo::plans::PlansRepo;
use crate::repo::scores::ScoresRepo;
use crate::service::plans;

#[derive(Deserialize)]
pub struct GenerateRequest {
    symbol: String,
    exchange: Exchange,
}

pub async fn generate(State(state): State<AppState>, Json(req): Json<GenerateRequest>) -> Result<Created<TradePlan>, AppError> {
    let bars = BarsRepo::new(&state.pool);
    let scores = ScoresRepo::new(&state.pool);
    let plans_repo = PlansRepo::new(&state.pool);

    let plan = plans::generate(&bars, &scores, &plans_repo, &req.symbol, req.exchange).await?;
    Ok(Created(plan))
}
