use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::models::RiskCheckResult;
use crate::errors::AppError;
use crate::http::envelope::{Created, Ok200};
use crate::http::state::AppState;
use crate::repo::audit::AuditRepo;
use crate::repo::bars::BarsRepo;
use crate::repo::order_drafts::OrderDraftsRepo;
use crate::repo::portfolios::PortfoliosRepo;
use crate::repo::risk::RiskRepo;
use crate::repo::sim::SimRepo;
use crate::service::risk;

#[derive(Deserialize)]
pub struct CheckRequest {
    portfolio_id: Uuid,
    draft_ids: Vec<Uuid>,
}

pub async fn check(State(state): State<AppState>, Json(req): Json<CheckRequest>) -> Result<Created<RiskCheckResult>, AppError> {
    let portfolios = PortfoliosRepo::new(&state.pool);
    let bars = BarsRepo::new(&state.pool);
    let order_drafts = OrderDraftsRepo::new(&state.pool);
    let sim = SimRepo::new(&state.pool);
    let risk_repo = RiskRepo::new(&state.pool);

    let result = risk::check(&state.config, &portfolios, &bars, &order_drafts, &sim, &risk_repo, req.portfolio_id, req.draft_ids).await?;
    state.metrics.inc_risk_check(result.status.to_string().as_str());

    AuditRepo::new(&state.pool)
        .record(
            "user",
            "risk.check",
            "riskcheck",
            &result.riskcheck_id.to_string(),
            serde_json::json!({ "portfolio_id": req.portfolio_id, "draft_ids": result.input_draft_ids }),
            serde_json::to_value(&result).unwrap_or(serde_json::Value::Null),
            Some(result.ruleset_version.clone()),
            None,
        )
        .await?;

    Ok(Created(result))
}

#[derive(Deserialize)]
pub struct RuleOverrideRequest {
    value: String,
}

pub async fn list_rules(State(state): State<AppState>) -> Result<Ok200<Vec<(String, String)>>, AppError> {
    let overrides = RiskRepo::new(&state.pool).list_overrides().await?;
    Ok(Ok200(overrides))
}

pub async fn override_rule(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<RuleOverrideRequest>,
) -> Result<Ok200<()>, AppError> {
    RiskRepo::new(&state.pool).set_override(&key, &req.value).await?;

    AuditRepo::new(&state.pool)
        .record(
            "user",
            "risk.rule_override",
            "risk_rule",
            &key,
            serde_json::json!({ "value": req.value }),
            serde_json::Value::Null,
            None,
            None,
        )
        .await?;

    Ok(Ok200(()))
}
