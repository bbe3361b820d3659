use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::types::{Adj, Exchange, RiskStatus, Side, TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub exchange: Exchange,
    pub market: String,
    pub name: String,
    pub industry: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarDaily {
    pub symbol: String,
    pub exchange: Exchange,
    pub trade_date: NaiveDate,
    pub adj: Adj,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
    pub pre_close: Option<f64>,
    pub source: String,
    pub quality: String,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub symbol: String,
    pub exchange: Exchange,
    pub report_period: String,
    pub report_type: String,
    pub pe_ttm: Option<f64>,
    pub pb: Option<f64>,
    pub ps_ttm: Option<f64>,
    pub market_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalFlowDaily {
    pub symbol: String,
    pub exchange: Exchange,
    pub trade_date: NaiveDate,
    pub net_inflow: Option<f64>,
    pub main_inflow: Option<f64>,
    pub northbound_net: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub score_id: Uuid,
    pub symbol: String,
    pub exchange: Exchange,
    pub trade_date: NaiveDate,
    pub score_total: f64,
    pub breakdown: Value,
    pub reasons: Vec<String>,
    pub ruleset_version: String,
    pub data_version: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePlan {
    pub plan_id: Uuid,
    pub symbol: String,
    pub exchange: Exchange,
    pub plan_version: i64,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub position_sizing: Option<f64>,
    pub based_on: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub note_id: Uuid,
    pub symbol: String,
    pub exchange: Exchange,
    pub content: String,
    pub references: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub portfolio_id: Uuid,
    pub name: String,
    pub base_currency: String,
    pub cash: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub portfolio_id: Uuid,
    pub symbol: String,
    pub exchange: Exchange,
    pub qty: i64,
    pub avg_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionView {
    #[serde(flatten)]
    pub position: Position,
    pub latest_close: Option<f64>,
    pub market_value: Option<f64>,
    pub unrealized_pnl: Option<f64>,
    pub unrealized_pnl_pct: Option<f64>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioView {
    pub portfolio: Portfolio,
    pub positions: Vec<PositionView>,
    pub total_equity: f64,
    pub cash_ratio: f64,
    pub missing_prices: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub draft_id: Uuid,
    pub portfolio_id: Uuid,
    pub symbol: String,
    pub exchange: Exchange,
    pub side: Side,
    pub order_type: String,
    pub price: Option<f64>,
    pub qty: i64,
    pub origin: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCheckItem {
    pub code: String,
    pub level: String,
    pub message: String,
    pub draft_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCheckResult {
    pub riskcheck_id: Uuid,
    pub portfolio_id: Uuid,
    pub status: RiskStatus,
    pub items: Vec<RiskCheckItem>,
    pub ruleset_version: String,
    pub input_draft_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimOrder {
    pub order_id: Uuid,
    pub portfolio_id: Uuid,
    pub status: String,
    pub draft_ids: Vec<Uuid>,
    pub filled_qty: i64,
    pub avg_fill_price: f64,
    pub fee_total: f64,
    pub slippage_total: f64,
    pub filled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimTrade {
    pub trade_id: Uuid,
    pub order_id: Uuid,
    pub portfolio_id: Uuid,
    pub draft_id: Uuid,
    pub symbol: String,
    pub exchange: Exchange,
    pub side: Side,
    pub qty: i64,
    pub fill_price: f64,
    pub fee: f64,
    pub slippage: f64,
    pub filled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub task_type: String,
    pub status: TaskStatus,
    pub payload: Value,
    pub result: Option<Value>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarTemplate {
    pub template_id: Uuid,
    pub name: String,
    pub universe: Value,
    pub rules: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarResult {
    pub task_id: Uuid,
    pub symbol: String,
    pub exchange: Exchange,
    pub score_total: f64,
    pub breakdown: Value,
    pub reasons: Vec<String>,
    pub key_metrics: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbDocument {
    pub doc_id: Uuid,
    pub doc_type: String,
    pub title: String,
    pub content: String,
    pub source_url: Option<String>,
    pub symbol: Option<String>,
    pub exchange: Option<Exchange>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub audit_id: Uuid,
    pub ts: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub input: Value,
    pub output: Value,
    pub ruleset_version: Option<String>,
    pub data_version: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub rule_id: Uuid,
    pub portfolio_id: Option<Uuid>,
    pub symbol: Option<String>,
    pub exchange: Option<Exchange>,
    pub rule_type: String,
    pub threshold: f64,
    pub direction: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: Uuid,
    pub rule_id: Uuid,
    pub severity: String,
    pub message: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub watchlist: String,
    pub symbol: String,
    pub exchange: Exchange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub news_id: Uuid,
    pub symbol: Option<String>,
    pub exchange: Option<Exchange>,
    pub title: String,
    pub content: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
}
