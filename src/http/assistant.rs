use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::errors::AppError;
use crate::http::envelope::Ok200;
use crate::http::state::AppState;
use crate::repo::bars::BarsRepo;
use crate::repo::capital_flow::CapitalFlowRepo;
use crate::repo::fundamentals::FundamentalsRepo;
use crate::repo::kb::KbRepo;
use crate::repo::news::NewsRepo;
use crate::repo::notes::NotesRepo;
use crate::repo::plans::PlansRepo;
use crate::repo::scores::ScoresRepo;
use crate::service::assistant::{self, AssistantRequest, AssistantResponse};

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default = "default_mode")]
    mode: String,
    prompt: String,
    target: Option<String>,
    #[serde(default = "default_style")]
    style: String,
    #[serde(default = "default_cite")]
    cite: String,
    #[serde(default)]
    save_note: bool,
}

fn default_mode() -> String {
    "summary".to_string()
}

fn default_style() -> String {
    "concise".to_string()
}

fn default_cite() -> String {
    "both".to_string()
}

pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Result<Ok200<AssistantResponse>, AppError> {
    let bars = BarsRepo::new(&state.pool);
    let fundamentals = FundamentalsRepo::new(&state.pool);
    let capital_flow = CapitalFlowRepo::new(&state.pool);
    let scores = ScoresRepo::new(&state.pool);
    let plans = PlansRepo::new(&state.pool);
    let notes = NotesRepo::new(&state.pool);
    let news = NewsRepo::new(&state.pool);
    let kb = KbRepo::new(&state.pool);

    let request = AssistantRequest {
        mode: req.mode,
        prompt: req.prompt,
        target: req.target,
        style: req.style,
        cite: req.cite,
        save_note: req.save_note,
    };

    let response = assistant::chat(&bars, &fundamentals, &capital_flow, &scores, &plans, &notes, &news, &kb, request).await?;
    Ok(Ok200(response))
}
