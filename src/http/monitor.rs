use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::models::{Alert, AlertRule};
use crate::domain::types::Exchange;
use crate::errors::AppError;
use crate::http::envelope::{Created, Ok200};
use crate::http::state::AppState;
use crate::repo::alerts::AlertsRepo;
use crate::repo::bars::BarsRepo;
use crate::repo::portfolios::PortfoliosRepo;
use crate::repo::scores::ScoresRepo;
use crate::service::monitor;

#[derive(Deserialize)]
pub struct CreateRuleRequest {
    portfolio_id: Option<Uuid>,
    symbol: Option<String>,
    exchange: Option<Exchange>,
    rule_type: String,
    threshold: f64,
    direction: String,
}

pub async fn create_rule(State(state): State<AppState>, Json(req): Json<CreateRuleRequest>) -> Result<Created<AlertRule>, AppError> {
    let rule = AlertsRepo::new(&state.pool)
        .create_rule(req.portfolio_id, req.symbol, req.exchange, &req.rule_type, req.threshold, &req.direction)
        .await?;
    Ok(Created(rule))
}

pub async fn check(State(state): State<AppState>) -> Result<Ok200<Vec<Alert>>, AppError> {
    let alerts = AlertsRepo::new(&state.pool);
    let bars = BarsRepo::new(&state.pool);
    let scores = ScoresRepo::new(&state.pool);
    let portfolios = PortfoliosRepo::new(&state.pool);

    let fired = monitor::check_rules(&alerts, &bars, &scores, &portfolios).await?;
    Ok(Ok200(fired))
}

#[derive(Deserialize)]
pub struct AlertsParams {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn alerts(State(state): State<AppState>, Query(params): Query<AlertsParams>) -> Result<Ok200<Vec<Alert>>, AppError> {
    let rows = AlertsRepo::new(&state.pool).list_recent(params.limit).await?;
    Ok(Ok200(rows))
}
