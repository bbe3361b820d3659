use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use crate::domain::models::Note;
use crate::domain::types::Exchange;
use crate::errors::AppError;
use crate::http::envelope::{Created, Ok200};
use crate::http::state::AppState;
use crate::repo::notes::NotesRepo;

#[derive(Deserialize)]
pub struct CreateRequest {
    symbol: String,
    exchange: Exchange,
    content: String,
    #[serde(default)]
    references: Vec<String>,
}

pub async fn create(State(state): State<AppState>, Json(req): Json<CreateRequest>) -> Result<Created<Note>, AppError> {
    let note = NotesRepo::new(&state.pool).create(&req.symbol, req.exchange, &req.content, req.references).await?;
    Ok(Created(note))
}

#[derive(Deserialize)]
pub struct ListParams {
    symbol: String,
    exchange: Exchange,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    20
}

pub async fn list(State(state): State<AppState>, Query(params): Query<ListParams>) -> Result<Ok200<Vec<Note>>, AppError> {
    let rows = NotesRepo::new(&state.pool).list(&params.symbol, params.exchange, params.limit).await?;
    Ok(Ok200(rows))
}
