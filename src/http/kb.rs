use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::domain::models::KbDocument;
use crate::domain::types::Exchange;
use crate::errors::AppError;
use crate::http::envelope::{Created, Ok200};
use crate::http::state::AppState;
use crate::repo::kb::KbRepo;

#[derive(Deserialize)]
pub struct SearchParams {
    q: String,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Serialize)]
pub struct SearchHit {
    doc_id: uuid::Uuid,
    title: String,
    snippet: String,
}

pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Ok200<Vec<SearchHit>>, AppError> {
    let hits = KbRepo::new(&state.pool).search(&params.q, params.limit).await?;
    Ok(Ok200(hits.into_iter().map(|h| SearchHit { doc_id: h.doc_id, title: h.title, snippet: h.snippet }).collect()))
}

#[derive(Deserialize)]
pub struct CreateDocumentRequest {
    doc_type: String,
    title: String,
    content: String,
    source_url: Option<String>,
    symbol: Option<String>,
    exchange: Option<Exchange>,
    #[serde(default)]
    tags: Vec<String>,
}

pub async fn create_document(State(state): State<AppState>, Json(req): Json<CreateDocumentRequest>) -> Result<Created<KbDocument>, AppError> {
    let doc = KbRepo::new(&state.pool)
        .create(&req.doc_type, &req.title, &req.content, req.source_url, req.symbol, req.exchange, req.tags)
        .await?;
    Ok(Created(doc))
}
