use axum::extract::{Query, State};
use serde::Deserialize;

use crate::domain::models::AuditLog;
use crate::errors::AppError;
use crate::http::envelope::Ok200;
use crate::http::state::AppState;
use crate::repo::audit::AuditRepo;

#[derive(Deserialize)]
pub struct AuditParams {
    entity_type: String,
    entity_id: String,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list(State(state): State<AppState>, Query(params): Query<AuditParams>) -> Result<Ok200<Vec<AuditLog>>, AppError> {
    let rows = AuditRepo::new(&state.pool).list_for_entity(&params.entity_type, &params.entity_id, params.limit).await?;
    Ok(Ok200(rows))
}
