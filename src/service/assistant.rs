//! Deterministic offline assistant: stitches the workspace projection into a
//! templated research summary with citations. No LLM, no network I/O.

use crate::domain::types::{Adj, Exchange, normalize_symbol};
use crate::errors::AppError;
use crate::repo::bars::BarsRepo;
use crate::repo::capital_flow::CapitalFlowRepo;
use crate::repo::fundamentals::FundamentalsRepo;
use crate::repo::kb::KbRepo;
use crate::repo::news::NewsRepo;
use crate::repo::notes::NotesRepo;
use crate::repo::plans::PlansRepo;
use crate::repo::scores::ScoresRepo;
use crate::service::workspace::{self, Workspace};

pub struct AssistantRequest {
    pub mode: String,
    pub prompt: String,
    pub target: Option<String>,
    pub style: String,
    pub cite: String,
    pub save_note: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Citation {
    pub source_type: String,
    pub source_id: String,
    pub title: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Report {
    pub conclusion: String,
    pub evidence: Vec<String>,
    pub risks: Vec<String>,
    pub plan: Vec<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AssistantResponse {
    pub mode: String,
    pub target: Option<(String, Exchange)>,
    pub report: Report,
    pub sources: Vec<Citation>,
    pub note_id: Option<uuid::Uuid>,
}

/// Parses `"SSE/600519"` or a bare 6-digit code (exchange inferred) into `(symbol, exchange)`.
fn parse_target(target: Option<&str>) -> Option<(String, Exchange)> {
    let target = target?.trim();
    if target.is_empty() {
        return None;
    }
    if let Some((exch, sym)) = target.split_once('/') {
        let sym = sym.trim();
        if !sym.is_empty() {
            if let Ok(exchange) = exch.trim().to_uppercase().parse::<Exchange>() {
                return Some((normalize_symbol(sym), exchange));
            }
        }
    }
    let digits: String = target.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 6 {
        let symbol = digits[..6].to_string();
        return Some((symbol.clone(), Exchange::infer_from_symbol(&symbol)));
    }
    None
}

fn direction_and_confidence(score: Option<f64>) -> (&'static str, &'static str) {
    match score {
        Some(s) if s >= 80.0 => ("LONG", "HIGH"),
        Some(s) if s >= 65.0 => ("LEAN_LONG", "MED"),
        Some(s) if s <= 40.0 => ("AVOID", "HIGH"),
        Some(s) if s <= 55.0 => ("LEAN_SHORT", "MED"),
        Some(_) => ("NEUTRAL", "MED"),
        None => ("NEUTRAL", "MED"),
    }
}

fn build_report(symbol: Option<&str>, exchange: Option<Exchange>, ws: Option<&Workspace>, style: &str) -> Report {
    let score = ws.and_then(|w| w.latest_score.as_ref()).map(|s| s.score_total);
    let (direction, confidence) = direction_and_confidence(score);

    let mut evidence = Vec::new();
    if let Some(ws) = ws {
        if let Some(last) = ws.price_bars.last() {
            evidence.push(format!("latest close: {:.2} (RAW)", last.close));
        }
        if let Some(rsi) = ws.indicators.rsi14.last().and_then(|p| p.value) {
            evidence.push(format!("RSI(14): {rsi:.1}"));
        }
        if let (Some(ma20), Some(ma60)) = (
            ws.indicators.ma20.last().and_then(|p| p.value),
            ws.indicators.ma60.last().and_then(|p| p.value),
        ) {
            evidence.push(format!("moving averages: MA20 {ma20:.2} / MA60 {ma60:.2}"));
        }
        if let Some(fundamentals) = &ws.fundamentals_summary {
            if fundamentals.pe_ttm.is_some() || fundamentals.pb.is_some() {
                let pe = fundamentals.pe_ttm.map(|v| format!("{v:.1}")).unwrap_or_else(|| "--".to_string());
                let pb = fundamentals.pb.map(|v| format!("{v:.2}")).unwrap_or_else(|| "--".to_string());
                evidence.push(format!("valuation: PE(TTM) {pe} / PB {pb}"));
            }
        }
        if let Some(net_inflow) = ws.capital_flow.as_ref().and_then(|cf| cf.net_inflow) {
            evidence.push(format!("capital flow: net inflow {:.2}万", net_inflow / 10_000.0));
        }
    }
    if let Some(score) = score {
        evidence.push(format!("composite score: {score:.1}/100"));
    }

    let mut risks = Vec::new();
    if let Some(ws) = ws {
        if ws.fundamentals_summary.is_none() {
            risks.push("fundamentals missing: confidence reduced, consider refreshing ingestion".to_string());
        }
        if ws.capital_flow.is_none() {
            risks.push("capital flow missing: cannot confirm institutional participation".to_string());
        }
        if ws.news.is_empty() {
            risks.push("no recent news/announcements: consider refreshing sources".to_string());
        }
    }
    if let Some(score) = score {
        if score >= 80.0 {
            risks.push("high-score names are crowded trades: set a stop before entering".to_string());
        }
        if score <= 55.0 {
            risks.push("weak-score names tend to chop: wait for structural confirmation".to_string());
        }
    }

    let mut plan = Vec::new();
    if symbol.is_some() && exchange.is_some() {
        plan.push("cross-check news/capital flow against the technical read before sizing".to_string());
        plan.push("set a trigger price and a stop, and record it in a versioned trade plan".to_string());
        plan.push("draft an order, run risk check, then confirm".to_string());
    } else {
        plan.push("bind a symbol to get a fully traceable evidence chain".to_string());
    }

    match style {
        "brief" => {
            evidence.truncate(4);
            risks.truncate(3);
            plan.truncate(3);
        }
        "deep" => {}
        _ => {
            evidence.truncate(6);
            risks.truncate(4);
            plan.truncate(4);
        }
    }

    let conclusion = match (symbol, exchange) {
        (Some(symbol), Some(exchange)) => format!("{symbol}.{exchange} {direction} (confidence {confidence})"),
        _ => format!("{direction} (confidence {confidence})"),
    };

    Report { conclusion, evidence, risks, plan, score }
}

fn report_to_markdown(report: &Report, sources: &[Citation]) -> String {
    let mut out = String::new();
    out.push_str(&format!("## Conclusion\n{}\n\n", report.conclusion));
    out.push_str("## Evidence\n");
    for e in &report.evidence {
        out.push_str(&format!("- {e}\n"));
    }
    out.push_str("\n## Risks\n");
    for r in &report.risks {
        out.push_str(&format!("- {r}\n"));
    }
    out.push_str("\n## Plan\n");
    for p in &report.plan {
        out.push_str(&format!("- {p}\n"));
    }
    if !sources.is_empty() {
        out.push_str("\n## Citations\n");
        for s in sources.iter().take(10) {
            let title = s.title.as_deref().unwrap_or(&s.source_type);
            out.push_str(&format!("- [{}] {title}\n", s.source_type.to_uppercase()));
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
pub async fn chat(
    bars: &BarsRepo<'_>,
    fundamentals: &FundamentalsRepo<'_>,
    capital_flow: &CapitalFlowRepo<'_>,
    scores: &ScoresRepo<'_>,
    plans: &PlansRepo<'_>,
    notes: &NotesRepo<'_>,
    news: &NewsRepo<'_>,
    kb: &KbRepo<'_>,
    req: AssistantRequest,
) -> Result<AssistantResponse, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(AppError::validation("prompt is required"));
    }

    let target = parse_target(req.target.as_deref());

    let ws = match &target {
        Some((symbol, exchange)) => {
            match workspace::get_workspace(bars, fundamentals, capital_flow, scores, plans, notes, news, symbol, *exchange, Adj::Qfq).await {
                Ok(ws) => Some(ws),
                Err(AppError::DataNotReady { .. }) => None,
                Err(e) => return Err(e),
            }
        }
        None => None,
    };

    let mut sources = Vec::new();
    if let Some(ws) = &ws {
        if matches!(req.cite.as_str(), "news" | "both") {
            for item in ws.news.iter().take(6) {
                sources.push(Citation {
                    source_type: "news".to_string(),
                    source_id: item.news_id.to_string(),
                    title: Some(item.title.clone()),
                    detail: Some(item.source.clone()),
                });
            }
        }
    }
    if matches!(req.cite.as_str(), "kb" | "both") {
        let hits = kb.search(req.prompt.trim(), 6).await?;
        for hit in hits {
            sources.push(Citation {
                source_type: "kb".to_string(),
                source_id: hit.doc_id.to_string(),
                title: Some(hit.title),
                detail: Some(hit.snippet),
            });
        }
    }

    let (symbol, exchange) = target.clone().map(|(s, e)| (Some(s), Some(e))).unwrap_or((None, None));
    let report = build_report(symbol.as_deref(), exchange, ws.as_ref(), &req.style);

    let note_id = if req.save_note {
        match &target {
            Some((symbol, exchange)) => {
                let content = report_to_markdown(&report, &sources);
                let references = sources.iter().map(|s| format!("{}:{}", s.source_type, s.source_id)).collect();
                let note = notes.create(symbol, *exchange, &content, references).await?;
                Some(note.note_id)
            }
            None => None,
        }
    } else {
        None
    };

    Ok(AssistantResponse { mode: req.mode, target, report, sources, note_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;

    fn request(prompt: &str, target: Option<&str>) -> AssistantRequest {
        AssistantRequest {
            mode: "qa".to_string(),
            prompt: prompt.to_string(),
            target: target.map(|s| s.to_string()),
            style: "balanced".to_string(),
            cite: "news".to_string(),
            save_note: false,
        }
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        let bars = BarsRepo::new(&db.pool);
        let fundamentals = FundamentalsRepo::new(&db.pool);
        let capital_flow = CapitalFlowRepo::new(&db.pool);
        let scores = ScoresRepo::new(&db.pool);
        let plans = PlansRepo::new(&db.pool);
        let notes = NotesRepo::new(&db.pool);
        let news = NewsRepo::new(&db.pool);
        let kb = KbRepo::new(&db.pool);

        let result = chat(&bars, &fundamentals, &capital_flow, &scores, &plans, &notes, &news, &kb, request("  ", None)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn untargeted_prompt_still_produces_a_neutral_report() {
        let db = Database::new_in_memory().await.unwrap();
        let bars = BarsRepo::new(&db.pool);
        let fundamentals = FundamentalsRepo::new(&db.pool);
        let capital_flow = CapitalFlowRepo::new(&db.pool);
        let scores = ScoresRepo::new(&db.pool);
        let plans = PlansRepo::new(&db.pool);
        let notes = NotesRepo::new(&db.pool);
        let news = NewsRepo::new(&db.pool);
        let kb = KbRepo::new(&db.pool);

        let response = chat(&bars, &fundamentals, &capital_flow, &scores, &plans, &notes, &news, &kb, request("what do you think of liquor stocks?", None))
            .await
            .unwrap();

        assert!(response.target.is_none());
        assert!(response.report.conclusion.contains("NEUTRAL"));
        assert!(response.note_id.is_none());
    }

    #[tokio::test]
    async fn parses_exchange_prefixed_target() {
        assert_eq!(parse_target(Some("SSE/600519")), Some(("600519".to_string(), Exchange::Sse)));
        assert_eq!(parse_target(Some("600519")), Some(("600519".to_string(), Exchange::Sse)));
        assert_eq!(parse_target(Some("000001")), Some(("000001".to_string(), Exchange::Szse)));
    }
}
