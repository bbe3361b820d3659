use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::models::Task;
use crate::errors::AppError;
use crate::http::envelope::{Created, Ok200};
use crate::http::state::AppState;

#[derive(Deserialize)]
pub struct RunRequest {
    task_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

pub async fn run(State(state): State<AppState>, Json(req): Json<RunRequest>) -> Result<Created<Task>, AppError> {
    let task = state.orchestrator.submit(&req.task_type, req.payload).await?;
    Ok(Created(task))
}

pub async fn get(State(state): State<AppState>, Path(task_id): Path<Uuid>) -> Result<Ok200<Task>, AppError> {
    let task = state.orchestrator.get(task_id).await?.ok_or_else(|| AppError::validation("unknown task_id"))?;
    Ok(Ok200(task))
}
