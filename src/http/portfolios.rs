use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::models::PortfolioView;
use crate::errors::AppError;
use crate::http::envelope::{Created, Ok200};
use crate::http::state::AppState;
use crate::repo::audit::AuditRepo;
use crate::repo::bars::BarsRepo;
use crate::repo::portfolios::PortfoliosRepo;
use crate::service::portfolios;

#[derive(Deserialize)]
pub struct CreateRequest {
    name: String,
    #[serde(default = "default_currency")]
    base_currency: String,
    cash: f64,
}

fn default_currency() -> String {
    "CNY".to_string()
}

pub async fn create(State(state): State<AppState>, Json(req): Json<CreateRequest>) -> Result<Created<PortfolioView>, AppError> {
    let portfolios_repo = PortfoliosRepo::new(&state.pool);
    let portfolio = portfolios_repo.create(&req.name, &req.base_currency, req.cash).await?;

    let bars = BarsRepo::new(&state.pool);
    let view = portfolios::build_view(&portfolios_repo, &bars, portfolio.portfolio_id).await?;

    AuditRepo::new(&state.pool)
        .record(
            "user",
            "portfolio.create",
            "portfolio",
            &portfolio.portfolio_id.to_string(),
            serde_json::json!({ "name": req.name, "base_currency": req.base_currency, "cash": req.cash }),
            serde_json::to_value(&view).unwrap_or(serde_json::Value::Null),
            None,
            None,
        )
        .await?;

    Ok(Created(view))
}

pub async fn get(State(state): State<AppState>, Path(portfolio_id): Path<Uuid>) -> Result<Ok200<PortfolioView>, AppError> {
    let portfolios_repo = PortfoliosRepo::new(&state.pool);
    let bars = BarsRepo::new(&state.pool);
    let view = portfolios::build_view(&portfolios_repo, &bars, portfolio_id).await?;
    Ok(Ok200(view))
}
