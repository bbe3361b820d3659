use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::models::OrderDraft;
use crate::domain::types::{Exchange, Side};
use crate::errors::AppError;
use crate::http::envelope::{Created, Ok200};
use crate::http::state::AppState;
use crate::repo::audit::AuditRepo;
use crate::repo::order_drafts::OrderDraftsRepo;

#[derive(Deserialize)]
pub struct CreateRequest {
    portfolio_id: Uuid,
    symbol: String,
    exchange: Exchange,
    side: Side,
    #[serde(default = "default_order_type")]
    order_type: String,
    price: Option<f64>,
    qty: i64,
    #[serde(default = "default_origin")]
    origin: String,
}

fn default_order_type() -> String {
    "MARKET".to_string()
}

fn default_origin() -> String {
    "manual".to_string()
}

pub async fn create(State(state): State<AppState>, Json(req): Json<CreateRequest>) -> Result<Created<OrderDraft>, AppError> {
    if req.qty <= 0 {
        return Err(AppError::validation("qty must be positive"));
    }
    let repo = OrderDraftsRepo::new(&state.pool);
    let draft = repo
        .create(req.portfolio_id, &req.symbol, req.exchange, req.side, &req.order_type, req.price, req.qty, &req.origin)
        .await?;

    AuditRepo::new(&state.pool)
        .record(
            "user",
            "order_draft.create",
            "order_draft",
            &draft.draft_id.to_string(),
            serde_json::to_value(&draft).unwrap_or(serde_json::Value::Null),
            serde_json::to_value(&draft).unwrap_or(serde_json::Value::Null),
            None,
            None,
        )
        .await?;

    Ok(Created(draft))
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    price: Option<f64>,
    qty: i64,
}

pub async fn update(State(state): State<AppState>, Path(draft_id): Path<Uuid>, Json(req): Json<UpdateRequest>) -> Result<Ok200<OrderDraft>, AppError> {
    if req.qty <= 0 {
        return Err(AppError::validation("qty must be positive"));
    }
    let repo = OrderDraftsRepo::new(&state.pool);
    let updated = repo
        .update(draft_id, req.price, req.qty)
        .await?
        .ok_or_else(|| AppError::validation("unknown draft_id"))?;

    AuditRepo::new(&state.pool)
        .record(
            "user",
            "order_draft.update",
            "order_draft",
            &draft_id.to_string(),
            serde_json::json!({ "price": req.price, "qty": req.qty }),
            serde_json::to_value(&updated).unwrap_or(serde_json::Value::Null),
            None,
            None,
        )
        .await?;

    Ok(Ok200(updated))
}

pub async fn delete(State(state): State<AppState>, Path(draft_id): Path<Uuid>) -> Result<Ok200<bool>, AppError> {
    let repo = OrderDraftsRepo::new(&state.pool);
    let deleted = repo.delete(draft_id).await?;
    if !deleted {
        return Err(AppError::validation("unknown draft_id"));
    }

    AuditRepo::new(&state.pool)
        .record(
            "user",
            "order_draft.delete",
            "order_draft",
            &draft_id.to_string(),
            serde_json::Value::Null,
            serde_json::json!({ "deleted": true }),
            None,
            None,
        )
        .await?;

    Ok(Ok200(true))
}
