use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::http::envelope::Ok200;
use crate::http::state::AppState;
use crate::repo::audit::AuditRepo;
use crate::repo::bars::BarsRepo;
use crate::repo::order_drafts::OrderDraftsRepo;
use crate::repo::portfolios::PortfoliosRepo;
use crate::service::rebalance::{self, RebalanceInputs, RebalanceResult, TargetWeight};

#[derive(Deserialize)]
pub struct SuggestRequest {
    portfolio_id: Uuid,
    targets: Vec<TargetWeight>,
    #[serde(default = "default_cash_reserve_ratio")]
    cash_reserve_ratio: f64,
    #[serde(default = "default_lot_size")]
    lot_size: i64,
}

fn default_cash_reserve_ratio() -> f64 {
    0.05
}

fn default_lot_size() -> i64 {
    100
}

pub async fn suggest(State(state): State<AppState>, Json(req): Json<SuggestRequest>) -> Result<Ok200<RebalanceResult>, AppError> {
    let portfolios = PortfoliosRepo::new(&state.pool);
    let bars = BarsRepo::new(&state.pool);
    let order_drafts = OrderDraftsRepo::new(&state.pool);

    let inputs = RebalanceInputs {
        portfolio_id: req.portfolio_id,
        targets: req.targets,
        cash_reserve_ratio: req.cash_reserve_ratio,
        lot_size: req.lot_size,
    };

    let result = rebalance::plan(&portfolios, &bars, &order_drafts, inputs).await?;

    AuditRepo::new(&state.pool)
        .record(
            "user",
            "rebalance.suggest",
            "portfolio",
            &req.portfolio_id.to_string(),
            serde_json::json!({ "cash_reserve_ratio": req.cash_reserve_ratio, "lot_size": req.lot_size }),
            serde_json::to_value(&result).unwrap_or(serde_json::Value::Null),
            None,
            None,
        )
        .await?;

    Ok(Ok200(result))
}
