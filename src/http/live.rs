//! Live-trading adapter interface stub. The workbench is paper-trading only;
//! this endpoint exists so a future broker adapter has a fixed contract to fill in.

use axum::Json;

use crate::errors::AppError;
use crate::http::envelope::Ok200;

pub async fn orders(Json(_req): Json<serde_json::Value>) -> Result<Ok200<()>, AppError> {
    Err(AppError::LiveNotAvailable("live trading is not implemented; this is a paper-trading workbench".to_string()))
}
