//! Alerts/monitor: evaluates enabled rules against current market and portfolio
//! state, debounces re-firing, and persists triggered alerts.

use chrono::{Duration, Utc};

use crate::domain::models::{Alert, AlertRule};
use crate::domain::types::{Adj, Exchange};
use crate::repo::alerts::AlertsRepo;
use crate::repo::bars::BarsRepo;
use crate::repo::portfolios::PortfoliosRepo;
use crate::repo::scores::ScoresRepo;

const PRICE_SCORE_POSITION_CASH_DEBOUNCE_MINUTES: i64 = 60;
const VOLUME_DEBOUNCE_MINUTES: i64 = 120;

fn debounce_minutes(rule_type: &str) -> i64 {
    if rule_type == "volume_spike" {
        VOLUME_DEBOUNCE_MINUTES
    } else {
        PRICE_SCORE_POSITION_CASH_DEBOUNCE_MINUTES
    }
}

async fn debounced(alerts: &AlertsRepo<'_>, rule: &AlertRule) -> anyhow::Result<bool> {
    let Some(last_fired) = alerts.last_fired_at(rule.rule_id).await? else {
        return Ok(false);
    };
    Ok(Utc::now() - last_fired < Duration::minutes(debounce_minutes(&rule.rule_type)))
}

async fn check_price_change(alerts: &AlertsRepo<'_>, bars: &BarsRepo<'_>, rule: &AlertRule) -> anyhow::Result<Option<Alert>> {
    let (Some(symbol), Some(exchange)) = (rule.symbol.as_deref(), rule.exchange) else {
        return Ok(None);
    };
    let recent = bars.list_recent(symbol, exchange, Adj::Raw, 1).await?;
    let Some(last) = recent.last() else { return Ok(None) };
    let Some(pre_close) = last.pre_close else { return Ok(None) };
    if pre_close == 0.0 {
        return Ok(None);
    }
    let change_pct = (last.close - pre_close) / pre_close * 100.0;

    let triggered = match rule.direction.as_str() {
        "above" | "crosses_above" => change_pct > rule.threshold,
        "below" | "crosses_below" => change_pct < rule.threshold,
        _ => false,
    };
    if !triggered || debounced(alerts, rule).await? {
        return Ok(None);
    }

    let severity = if change_pct.abs() < 10.0 { "WARN" } else { "CRITICAL" };
    let alert = alerts
        .fire(
            rule.rule_id,
            severity,
            &format!("{symbol} price change {change_pct:.2}% crossed threshold {:.2}%", rule.threshold),
            serde_json::json!({
                "symbol": symbol,
                "exchange": exchange.to_string(),
                "current_price": last.close,
                "pre_close": pre_close,
                "change_pct": change_pct,
                "threshold": rule.threshold,
                "direction": rule.direction,
            }),
        )
        .await?;
    Ok(Some(alert))
}

async fn check_volume_spike(alerts: &AlertsRepo<'_>, bars: &BarsRepo<'_>, rule: &AlertRule) -> anyhow::Result<Option<Alert>> {
    let (Some(symbol), Some(exchange)) = (rule.symbol.as_deref(), rule.exchange) else {
        return Ok(None);
    };
    let recent = bars.list_recent(symbol, exchange, Adj::Raw, 21).await?;
    if recent.len() < 20 {
        return Ok(None);
    }
    let today = recent.last().unwrap();
    let baseline = &recent[recent.len() - 20..recent.len() - 1];
    if baseline.is_empty() {
        return Ok(None);
    }
    let avg_volume: f64 = baseline.iter().map(|b| b.volume).sum::<f64>() / baseline.len() as f64;
    if avg_volume <= 0.0 {
        return Ok(None);
    }
    let volume_ratio = today.volume / avg_volume;
    if volume_ratio <= rule.threshold || debounced(alerts, rule).await? {
        return Ok(None);
    }

    let alert = alerts
        .fire(
            rule.rule_id,
            "INFO",
            &format!("{symbol} volume spiked to {volume_ratio:.1}x average"),
            serde_json::json!({
                "symbol": symbol,
                "exchange": exchange.to_string(),
                "today_volume": today.volume,
                "avg_volume": avg_volume,
                "volume_ratio": volume_ratio,
                "threshold": rule.threshold,
            }),
        )
        .await?;
    Ok(Some(alert))
}

async fn check_score_change(alerts: &AlertsRepo<'_>, scores: &ScoresRepo<'_>, rule: &AlertRule) -> anyhow::Result<Option<Alert>> {
    let (Some(symbol), Some(exchange)) = (rule.symbol.as_deref(), rule.exchange) else {
        return Ok(None);
    };
    let recent = scores.list_recent(symbol, exchange, 2).await?;
    if recent.len() < 2 {
        return Ok(None);
    }
    let latest_score = recent[0].score_total;
    let prev_score = recent[1].score_total;
    let score_change = latest_score - prev_score;

    if score_change.abs() <= rule.threshold || debounced(alerts, rule).await? {
        return Ok(None);
    }

    let alert = alerts
        .fire(
            rule.rule_id,
            "INFO",
            &format!("{symbol} score moved {score_change:+.1}"),
            serde_json::json!({
                "symbol": symbol,
                "exchange": exchange.to_string(),
                "latest_score": latest_score,
                "prev_score": prev_score,
                "score_change": score_change,
                "threshold": rule.threshold,
            }),
        )
        .await?;
    Ok(Some(alert))
}

async fn check_position_limit(alerts: &AlertsRepo<'_>, bars: &BarsRepo<'_>, portfolios: &PortfoliosRepo<'_>, rule: &AlertRule) -> anyhow::Result<Option<Alert>> {
    let Some(portfolio_id) = rule.portfolio_id else { return Ok(None) };
    let Some(portfolio) = portfolios.get(portfolio_id).await? else { return Ok(None) };
    let positions = portfolios.list_positions(portfolio_id).await?;
    if positions.is_empty() {
        return Ok(None);
    }

    let mut valued = Vec::with_capacity(positions.len());
    for position in &positions {
        if let Some(close) = bars.latest_close(&position.symbol, position.exchange, Adj::Qfq).await? {
            valued.push((position, close * position.qty as f64));
        }
    }
    let Some((top, top_value)) = valued.iter().max_by(|a, b| a.1.total_cmp(&b.1)).copied() else {
        return Ok(None);
    };
    let position_value_sum: f64 = valued.iter().map(|(_, v)| v).sum();
    let total_equity = portfolio.cash + position_value_sum;
    if total_equity <= 0.0 {
        return Ok(None);
    }
    let top_pct = top_value / total_equity * 100.0;

    if top_pct <= rule.threshold || debounced(alerts, rule).await? {
        return Ok(None);
    }

    let alert = alerts
        .fire(
            rule.rule_id,
            "WARN",
            &format!("portfolio {portfolio_id} single-symbol weight {top_pct:.1}% exceeds limit {:.1}%", rule.threshold),
            serde_json::json!({
                "portfolio_id": portfolio_id.to_string(),
                "symbol": top.symbol,
                "exchange": top.exchange.to_string(),
                "position_value": top_value,
                "position_pct": top_pct,
                "total_equity": total_equity,
                "threshold": rule.threshold,
            }),
        )
        .await?;
    Ok(Some(alert))
}

async fn check_cash_ratio(alerts: &AlertsRepo<'_>, bars: &BarsRepo<'_>, portfolios: &PortfoliosRepo<'_>, rule: &AlertRule) -> anyhow::Result<Option<Alert>> {
    let Some(portfolio_id) = rule.portfolio_id else { return Ok(None) };
    let Some(portfolio) = portfolios.get(portfolio_id).await? else { return Ok(None) };
    let positions = portfolios.list_positions(portfolio_id).await?;

    let mut position_value_sum = 0.0;
    for position in &positions {
        if let Some(close) = bars.latest_close(&position.symbol, position.exchange, Adj::Qfq).await? {
            position_value_sum += close * position.qty as f64;
        }
    }
    let total_equity = portfolio.cash + position_value_sum;
    if total_equity <= 0.0 {
        return Ok(None);
    }
    let cash_ratio = portfolio.cash / total_equity * 100.0;

    if cash_ratio >= rule.threshold || debounced(alerts, rule).await? {
        return Ok(None);
    }

    let alert = alerts
        .fire(
            rule.rule_id,
            "WARN",
            &format!("portfolio {portfolio_id} cash ratio {cash_ratio:.1}% below threshold {:.1}%", rule.threshold),
            serde_json::json!({
                "portfolio_id": portfolio_id.to_string(),
                "cash": portfolio.cash,
                "cash_ratio": cash_ratio,
                "total_equity": total_equity,
                "threshold": rule.threshold,
            }),
        )
        .await?;
    Ok(Some(alert))
}

/// Evaluates every enabled rule once and returns whatever alerts fired this pass.
pub async fn check_rules(
    alerts: &AlertsRepo<'_>,
    bars: &BarsRepo<'_>,
    scores: &ScoresRepo<'_>,
    portfolios: &PortfoliosRepo<'_>,
) -> anyhow::Result<Vec<Alert>> {
    let rules = alerts.list_enabled_rules().await?;
    let mut fired = Vec::new();

    for rule in &rules {
        let outcome = match rule.rule_type.as_str() {
            "price_change_pct" => check_price_change(alerts, bars, rule).await?,
            "volume_spike" => check_volume_spike(alerts, bars, rule).await?,
            "score_change" => check_score_change(alerts, scores, rule).await?,
            "position_limit" => check_position_limit(alerts, bars, portfolios, rule).await?,
            "cash_ratio" => check_cash_ratio(alerts, bars, portfolios, rule).await?,
            _ => None,
        };
        if let Some(alert) = outcome {
            fired.push(alert);
        }
    }

    Ok(fired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::BarDailyRow;
    use crate::infrastructure::persistence::Database;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn price_change_above_threshold_fires_once_then_debounces() {
        let db = Database::new_in_memory().await.unwrap();
        let alerts = AlertsRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let scores = ScoresRepo::new(&db.pool);
        let portfolios = PortfoliosRepo::new(&db.pool);

        bars.upsert_many(
            &[BarDailyRow {
                symbol: "600519".to_string(),
                exchange: Exchange::Sse,
                trade_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
                adj: Adj::Raw,
                open: 1000.0,
                high: 1100.0,
                low: 1000.0,
                close: 1100.0,
                volume: 1_000_000.0,
                amount: 1_100_000_000.0,
                pre_close: Some(1000.0),
            }],
            "local",
        )
        .await
        .unwrap();

        alerts
            .create_rule(None, Some("600519".to_string()), Some(Exchange::Sse), "price_change_pct", 5.0, "above")
            .await
            .unwrap();

        let fired = check_rules(&alerts, &bars, &scores, &portfolios).await.unwrap();
        assert_eq!(fired.len(), 1);

        let fired_again = check_rules(&alerts, &bars, &scores, &portfolios).await.unwrap();
        assert!(fired_again.is_empty());
    }

    #[tokio::test]
    async fn cash_ratio_below_threshold_fires() {
        let db = Database::new_in_memory().await.unwrap();
        let alerts = AlertsRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let scores = ScoresRepo::new(&db.pool);
        let portfolios = PortfoliosRepo::new(&db.pool);

        let portfolio = portfolios.create("demo", "CNY", 1_000.0).await.unwrap();
        portfolios.apply_fill(portfolio.portfolio_id, "600519", Exchange::Sse, 100, 1000.0).await.unwrap();
        bars.upsert_many(
            &[BarDailyRow {
                symbol: "600519".to_string(),
                exchange: Exchange::Sse,
                trade_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
                adj: Adj::Qfq,
                open: 1000.0,
                high: 1000.0,
                low: 1000.0,
                close: 1000.0,
                volume: 1.0,
                amount: 1.0,
                pre_close: Some(1000.0),
            }],
            "local",
        )
        .await
        .unwrap();

        alerts
            .create_rule(Some(portfolio.portfolio_id), None, None, "cash_ratio", 10.0, "below")
            .await
            .unwrap();

        let fired = check_rules(&alerts, &bars, &scores, &portfolios).await.unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].severity, "WARN");
    }
}
