//! Radar scanner: filters a universe by rule predicates, scores survivors, persists results.

use serde_json::Value;
use uuid::Uuid;

use crate::domain::models::{Instrument, RadarResult};
use crate::domain::types::Exchange;
use crate::repo::bars::BarsRepo;
use crate::repo::instruments::InstrumentsRepo;
use crate::repo::radar::RadarRepo;
use crate::repo::watchlists::WatchlistsRepo;
use crate::service::scoring;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RadarRule {
    pub field: String,
    pub op: String,
    pub value: Value,
}

pub struct RunOutcome {
    pub task_id: Uuid,
    pub count: usize,
    pub skipped_no_data: usize,
}

fn field_value(instrument: &Instrument, field: &str) -> Option<Value> {
    match field {
        "symbol" => Some(Value::String(instrument.symbol.clone())),
        "exchange" => Some(Value::String(instrument.exchange.to_string())),
        "market" => Some(Value::String(instrument.market.clone())),
        "name" => Some(Value::String(instrument.name.clone())),
        "industry" => instrument.industry.clone().map(Value::String),
        _ => None,
    }
}

fn match_rule(instrument: &Instrument, rule: &RadarRule) -> Option<String> {
    let value = field_value(instrument, &rule.field)?;
    match rule.op.as_str() {
        "eq" => (value == rule.value).then(|| format!("{}=={}", rule.field, rule.value)),
        "in" => {
            let list = rule.value.as_array()?;
            list.contains(&value).then(|| format!("{} in {}", rule.field, rule.value))
        }
        "prefix" => {
            let v = value.as_str()?;
            let prefix = rule.value.as_str()?;
            v.starts_with(prefix).then(|| format!("{} startswith {}", rule.field, prefix))
        }
        _ => None,
    }
}

async fn select_universe(
    instruments: &InstrumentsRepo<'_>,
    watchlists: &WatchlistsRepo<'_>,
    universe: &Value,
) -> anyhow::Result<Vec<Instrument>> {
    let utype = universe.get("type").and_then(Value::as_str).unwrap_or("ALL");

    match utype {
        "CUSTOM" => {
            let symbols = universe.get("symbols").and_then(Value::as_array).cloned().unwrap_or_default();
            let mut out = Vec::new();
            for entry in symbols {
                let (symbol, exchange) = match &entry {
                    Value::Object(map) => {
                        let symbol = map.get("symbol").and_then(Value::as_str).unwrap_or("").trim().to_string();
                        if symbol.is_empty() {
                            continue;
                        }
                        let exchange = map
                            .get("exchange")
                            .and_then(Value::as_str)
                            .and_then(|s| s.parse().ok())
                            .unwrap_or_else(|| Exchange::infer_from_symbol(&symbol));
                        (crate::domain::types::normalize_symbol(&symbol), exchange)
                    }
                    Value::String(s) => {
                        let symbol = crate::domain::types::normalize_symbol(s.trim());
                        let exchange = Exchange::infer_from_symbol(&symbol);
                        (symbol, exchange)
                    }
                    _ => continue,
                };
                if let Some(instrument) = instruments.get(&symbol, exchange).await? {
                    out.push(instrument);
                }
            }
            Ok(out)
        }
        "WATCHLIST" => {
            let list_name = universe.get("list_type").and_then(Value::as_str).unwrap_or("WATCH");
            let items = watchlists.list(list_name).await?;
            let mut out = Vec::new();
            for item in items {
                if let Some(instrument) = instruments.get(&item.symbol, item.exchange).await? {
                    out.push(instrument);
                }
            }
            Ok(out)
        }
        _ => instruments.search("", 10_000).await,
    }
}

pub async fn run(
    instruments: &InstrumentsRepo<'_>,
    watchlists: &WatchlistsRepo<'_>,
    bars: &BarsRepo<'_>,
    radar: &RadarRepo<'_>,
    task_id: Uuid,
    universe: &Value,
    rules: &[RadarRule],
) -> anyhow::Result<RunOutcome> {
    let universe_instruments = select_universe(instruments, watchlists, universe).await?;

    let mut count = 0usize;
    let mut skipped_no_data = 0usize;

    for instrument in universe_instruments {
        let mut rule_reasons = Vec::new();
        let mut matched_all = true;
        for rule in rules {
            match match_rule(&instrument, rule) {
                Some(reason) => rule_reasons.push(reason),
                None => {
                    matched_all = false;
                    break;
                }
            }
        }
        if !matched_all {
            continue;
        }

        let recent_bars = bars
            .list_recent(&instrument.symbol, instrument.exchange, crate::domain::types::Adj::Qfq, 120)
            .await?;
        let outcome = match scoring::score(&recent_bars) {
            Ok(outcome) => outcome,
            Err(_) => {
                skipped_no_data += 1;
                continue;
            }
        };

        let mut reasons = rule_reasons;
        reasons.extend(outcome.reasons);

        let key_metrics = serde_json::json!({
            "name": instrument.name,
            "industry": instrument.industry,
        });

        radar
            .insert_result(&RadarResult {
                task_id,
                symbol: instrument.symbol,
                exchange: instrument.exchange,
                score_total: outcome.score_total,
                breakdown: outcome.breakdown,
                reasons,
                key_metrics,
            })
            .await?;
        count += 1;
    }

    Ok(RunOutcome { task_id, count, skipped_no_data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{BarDailyRow, InstrumentRow};
    use crate::infrastructure::persistence::Database;
    use chrono::NaiveDate;

    async fn seed_bars(bars: &BarsRepo<'_>, symbol: &str, exchange: Exchange) {
        let rows: Vec<BarDailyRow> = (0..60)
            .map(|i| BarDailyRow {
                symbol: symbol.to_string(),
                exchange,
                trade_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + chrono::Duration::days(i),
                adj: crate::domain::types::Adj::Qfq,
                open: 1000.0,
                high: 1000.0,
                low: 1000.0,
                close: 1000.0,
                volume: 1_000_000.0,
                amount: 1_500_000_000.0,
                pre_close: Some(1000.0),
            })
            .collect();
        bars.upsert_many(&rows, "local").await.unwrap();
    }

    #[tokio::test]
    async fn run_scores_all_active_instruments_by_default() {
        let db = Database::new_in_memory().await.unwrap();
        let instruments = InstrumentsRepo::new(&db.pool);
        let watchlists = WatchlistsRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let radar = RadarRepo::new(&db.pool);

        instruments
            .upsert_many(&[InstrumentRow {
                symbol: "600519".to_string(),
                exchange: Exchange::Sse,
                market: "CN_A".to_string(),
                name: "Moutai".to_string(),
                industry: Some("Liquor".to_string()),
            }])
            .await
            .unwrap();
        seed_bars(&bars, "600519", Exchange::Sse).await;

        let task_id = Uuid::new_v4();
        let outcome = run(&instruments, &watchlists, &bars, &radar, task_id, &serde_json::json!({"type": "ALL"}), &[])
            .await
            .unwrap();

        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.skipped_no_data, 0);

        let results = radar.list_results(task_id).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn run_counts_instruments_without_enough_bars_as_skipped() {
        let db = Database::new_in_memory().await.unwrap();
        let instruments = InstrumentsRepo::new(&db.pool);
        let watchlists = WatchlistsRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let radar = RadarRepo::new(&db.pool);

        instruments
            .upsert_many(&[InstrumentRow {
                symbol: "000001".to_string(),
                exchange: Exchange::Szse,
                market: "CN_A".to_string(),
                name: "Ping An Bank".to_string(),
                industry: None,
            }])
            .await
            .unwrap();

        let task_id = Uuid::new_v4();
        let outcome = run(&instruments, &watchlists, &bars, &radar, task_id, &serde_json::json!({"type": "ALL"}), &[])
            .await
            .unwrap();

        assert_eq!(outcome.count, 0);
        assert_eq!(outcome.skipped_no_data, 1);
    }
}
