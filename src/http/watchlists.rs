use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::domain::models::WatchlistItem;
use crate::domain::types::Exchange;
use crate::errors::AppError;
use crate::http::envelope::{Created, Ok200};
use crate::http::state::AppState;
use crate::repo::watchlists::WatchlistsRepo;

#[derive(Deserialize)]
pub struct ListParams {
    watchlist: String,
}

pub async fn list(State(state): State<AppState>, Query(params): Query<ListParams>) -> Result<Ok200<Vec<WatchlistItem>>, AppError> {
    let rows = WatchlistsRepo::new(&state.pool).list(&params.watchlist).await?;
    Ok(Ok200(rows))
}

#[derive(Deserialize)]
pub struct AddItemRequest {
    symbol: String,
    exchange: Exchange,
}

pub async fn add_item(
    State(state): State<AppState>,
    Path(watchlist): Path<String>,
    Json(req): Json<AddItemRequest>,
) -> Result<Created<WatchlistItem>, AppError> {
    WatchlistsRepo::new(&state.pool).add(&watchlist, &req.symbol, req.exchange).await?;
    Ok(Created(WatchlistItem { watchlist, symbol: req.symbol, exchange: req.exchange }))
}

#[derive(Deserialize)]
pub struct RemoveItemRequest {
    symbol: String,
    exchange: Exchange,
}

pub async fn remove_item(
    State(state): State<AppState>,
    Path(watchlist): Path<String>,
    Json(req): Json<RemoveItemRequest>,
) -> Result<Ok200<()>, AppError> {
    WatchlistsRepo::new(&state.pool).remove(&watchlist, &req.symbol, req.exchange).await?;
    Ok(Ok200(()))
}
