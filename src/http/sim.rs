use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::{SimOrder, SimTrade};
use crate::errors::AppError;
use crate::http::envelope::{Created, Ok200};
use crate::http::state::AppState;
use crate::repo::audit::AuditRepo;
use crate::repo::bars::BarsRepo;
use crate::repo::order_drafts::OrderDraftsRepo;
use crate::repo::portfolios::PortfoliosRepo;
use crate::repo::risk::RiskRepo;
use crate::repo::sim::SimRepo;
use crate::service::sim;

#[derive(Deserialize)]
pub struct ConfirmRequest {
    portfolio_id: Uuid,
    riskcheck_id: Uuid,
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    order: SimOrder,
    trades: Vec<SimTrade>,
}

pub async fn confirm(State(state): State<AppState>, Json(req): Json<ConfirmRequest>) -> Result<Created<ConfirmResponse>, AppError> {
    let portfolios = PortfoliosRepo::new(&state.pool);
    let bars = BarsRepo::new(&state.pool);
    let order_drafts = OrderDraftsRepo::new(&state.pool);
    let risk_repo = RiskRepo::new(&state.pool);
    let sim_repo = SimRepo::new(&state.pool);

    let outcome = sim::confirm(&state.config, &portfolios, &bars, &order_drafts, &risk_repo, &sim_repo, req.portfolio_id, req.riskcheck_id).await?;
    state.metrics.inc_sim_confirm("FILLED");

    AuditRepo::new(&state.pool)
        .record(
            "user",
            "sim.confirm",
            "sim_order",
            &outcome.order.order_id.to_string(),
            serde_json::json!({ "portfolio_id": req.portfolio_id, "riskcheck_id": req.riskcheck_id }),
            serde_json::json!({ "order": &outcome.order, "trades": &outcome.trades }),
            None,
            None,
        )
        .await?;

    Ok(Created(ConfirmResponse { order: outcome.order, trades: outcome.trades }))
}

#[derive(Deserialize)]
pub struct LedgerParams {
    portfolio_id: Uuid,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn orders(State(state): State<AppState>, Query(params): Query<LedgerParams>) -> Result<Ok200<Vec<SimOrder>>, AppError> {
    let rows = SimRepo::new(&state.pool).list_orders_for_portfolio(params.portfolio_id, params.limit).await?;
    Ok(Ok200(rows))
}

pub async fn trades(State(state): State<AppState>, Query(params): Query<LedgerParams>) -> Result<Ok200<Vec<SimTrade>>, AppError> {
    let rows = SimRepo::new(&state.pool).list_trades_for_portfolio(params.portfolio_id, params.limit).await?;
    Ok(Ok200(rows))
}
