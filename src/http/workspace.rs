use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::domain::types::{Adj, Exchange};
use crate::errors::AppError;
use crate::http::envelope::Ok200;
use crate::http::state::AppState;
use crate::repo::bars::BarsRepo;
use crate::repo::capital_flow::CapitalFlowRepo;
use crate::repo::fundamentals::FundamentalsRepo;
use crate::repo::news::NewsRepo;
use crate::repo::notes::NotesRepo;
use crate::repo::plans::PlansRepo;
use crate::repo::scores::ScoresRepo;
use crate::service::workspace::{self, Workspace};

#[derive(Deserialize)]
pub struct WorkspaceParams {
    adj: Option<Adj>,
}

pub async fn get_workspace(
    State(state): State<AppState>,
    Path((exchange, symbol)): Path<(String, String)>,
    Query(params): Query<WorkspaceParams>,
) -> Result<Ok200<Workspace>, AppError> {
    let exchange: Exchange = exchange.parse().map_err(|e: String| AppError::validation(e))?;
    let adj = params.adj.unwrap_or_default();

    let bars = BarsRepo::new(&state.pool);
    let fundamentals = FundamentalsRepo::new(&state.pool);
    let capital_flow = CapitalFlowRepo::new(&state.pool);
    let scores = ScoresRepo::new(&state.pool);
    let plans = PlansRepo::new(&state.pool);
    let notes = NotesRepo::new(&state.pool);
    let news = NewsRepo::new(&state.pool);

    let ws = workspace::get_workspace(&bars, &fundamentals, &capital_flow, &scores, &plans, &notes, &news, &symbol, exchange, adj).await?;
    Ok(Ok200(ws))
}
