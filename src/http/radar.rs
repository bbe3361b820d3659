use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::models::{RadarResult, Task};
use crate::errors::AppError;
use crate::http::envelope::{Created, Ok200};
use crate::http::state::AppState;
use crate::repo::radar::RadarRepo;

#[derive(Deserialize)]
pub struct RunRequest {
    #[serde(default = "default_universe")]
    universe: serde_json::Value,
    #[serde(default = "default_rules")]
    rules: serde_json::Value,
}

fn default_universe() -> serde_json::Value {
    serde_json::json!({ "type": "ALL" })
}

fn default_rules() -> serde_json::Value {
    serde_json::json!([])
}

pub async fn run(State(state): State<AppState>, Json(req): Json<RunRequest>) -> Result<Created<Task>, AppError> {
    let payload = serde_json::json!({ "universe": req.universe, "rules": req.rules });
    let task = state.orchestrator.submit("radar_run", payload).await?;
    Ok(Created(task))
}

#[derive(Deserialize)]
pub struct ResultsParams {
    task_id: Uuid,
}

pub async fn results(State(state): State<AppState>, Query(params): Query<ResultsParams>) -> Result<Ok200<Vec<RadarResult>>, AppError> {
    let rows = RadarRepo::new(&state.pool).list_results(params.task_id).await?;
    Ok(Ok200(rows))
}
