use axum::extract::{Query, State};
use serde::Deserialize;

use crate::domain::models::Instrument;
use crate::errors::AppError;
use crate::http::envelope::Ok200;
use crate::http::state::AppState;
use crate::repo::instruments::InstrumentsRepo;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    20
}

pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Ok200<Vec<Instrument>>, AppError> {
    let rows = InstrumentsRepo::new(&state.pool).search(&params.q, params.limit).await?;
    Ok(Ok200(rows))
}
