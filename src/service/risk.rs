//! Sequential pre-trade risk engine, ruleset `risk/v1`.
//!
//! Drafts are simulated in the given order against a running cash/position
//! snapshot so an insufficient-cash or position-limit check on draft N sees
//! the effect of drafts before it, not the portfolio's current on-disk state.

use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::models::{RiskCheckItem, RiskCheckResult};
use crate::domain::types::{Adj, Exchange, RiskStatus, Side};
use crate::errors::AppError;
use crate::repo::bars::BarsRepo;
use crate::repo::order_drafts::OrderDraftsRepo;
use crate::repo::portfolios::PortfoliosRepo;
use crate::repo::risk::RiskRepo;
use crate::repo::sim::SimRepo;

pub const RULESET_VERSION: &str = "risk/v1";

struct Thresholds {
    lot_size: i64,
    price_deviation_limit: f64,
    min_order_value: f64,
    max_order_value: f64,
    min_cash_ratio: f64,
    max_position_per_symbol: f64,
    min_interval_seconds: i64,
    max_daily_trading_value: f64,
    max_orders_per_day: i64,
}

async fn load_thresholds(cfg: &Config, risk_repo: &RiskRepo<'_>) -> anyhow::Result<Thresholds> {
    let mut t = Thresholds {
        lot_size: cfg.risk_lot_size,
        price_deviation_limit: cfg.risk_deviation_limit,
        min_order_value: cfg.risk_min_order_value,
        max_order_value: cfg.risk_max_order_value,
        min_cash_ratio: cfg.risk_min_cash_ratio,
        max_position_per_symbol: cfg.risk_max_position_per_symbol,
        min_interval_seconds: cfg.risk_min_interval_seconds,
        max_daily_trading_value: cfg.risk_max_daily_trading_value,
        max_orders_per_day: cfg.risk_max_orders_per_day,
    };
    for (key, value) in risk_repo.list_overrides().await? {
        match key.as_str() {
            "lot_size" => t.lot_size = value.parse().unwrap_or(t.lot_size),
            "price_deviation_limit" => t.price_deviation_limit = value.parse().unwrap_or(t.price_deviation_limit),
            "min_order_value" => t.min_order_value = value.parse().unwrap_or(t.min_order_value),
            "max_order_value" => t.max_order_value = value.parse().unwrap_or(t.max_order_value),
            "min_cash_ratio" => t.min_cash_ratio = value.parse().unwrap_or(t.min_cash_ratio),
            "max_position_per_symbol" => t.max_position_per_symbol = value.parse().unwrap_or(t.max_position_per_symbol),
            "min_interval_seconds" => t.min_interval_seconds = value.parse().unwrap_or(t.min_interval_seconds),
            "max_daily_trading_value" => t.max_daily_trading_value = value.parse().unwrap_or(t.max_daily_trading_value),
            "max_orders_per_day" => t.max_orders_per_day = value.parse().unwrap_or(t.max_orders_per_day),
            _ => {}
        }
    }
    Ok(t)
}

fn worst_of(a: RiskStatus, b: RiskStatus) -> RiskStatus {
    use RiskStatus::*;
    match (a, b) {
        (Fail, _) | (_, Fail) => Fail,
        (Warn, _) | (_, Warn) => Warn,
        _ => Pass,
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn check(
    cfg: &Config,
    portfolios: &PortfoliosRepo<'_>,
    bars: &BarsRepo<'_>,
    order_drafts_repo: &OrderDraftsRepo<'_>,
    sim: &SimRepo<'_>,
    risk_repo: &RiskRepo<'_>,
    portfolio_id: Uuid,
    draft_ids: Vec<Uuid>,
) -> Result<RiskCheckResult, AppError> {
    if draft_ids.is_empty() {
        return Err(AppError::validation("draft_ids must not be empty"));
    }

    let thresholds = load_thresholds(cfg, risk_repo).await?;

    let drafts = order_drafts_repo.get_many(&draft_ids).await?;
    if drafts.len() != draft_ids.len() {
        return Err(AppError::validation("one or more draft_ids do not exist"));
    }
    if drafts.iter().any(|d| d.portfolio_id != portfolio_id) {
        return Err(AppError::validation("drafts must all belong to the given portfolio"));
    }

    let portfolio = portfolios
        .get(portfolio_id)
        .await?
        .ok_or_else(|| AppError::validation("unknown portfolio"))?;
    let positions = portfolios.list_positions(portfolio_id).await?;

    let mut qty_map: HashMap<(String, Exchange), i64> = HashMap::new();
    for p in &positions {
        qty_map.insert((p.symbol.clone(), p.exchange), p.qty);
    }

    let mut items: Vec<RiskCheckItem> = Vec::new();
    let mut status = RiskStatus::Pass;

    let today_start = Utc::now().format("%Y-%m-%dT00:00:00").to_string();
    let orders_today = sim.orders_since(portfolio_id, &today_start).await?;
    if orders_today >= thresholds.max_orders_per_day {
        items.push(RiskCheckItem {
            code: "RISK_MAX_ORDERS_PER_DAY".to_string(),
            level: "WARN".to_string(),
            message: format!("already placed {orders_today} orders today, limit is {}", thresholds.max_orders_per_day),
            draft_id: None,
        });
        status = worst_of(status, RiskStatus::Warn);
    }

    let mut price_missing = false;
    let mut positions_mv = 0.0;
    for ((symbol, exchange), qty) in &qty_map {
        match bars.latest_close(symbol, *exchange, Adj::Qfq).await? {
            Some(price) => positions_mv += price * *qty as f64,
            None => price_missing = true,
        }
    }
    let mut total_equity = portfolio.cash + positions_mv;
    if total_equity <= 0.0 {
        total_equity = portfolio.cash;
    }
    let mut cash_now = portfolio.cash;

    let mut price_cache: HashMap<(String, Exchange), f64> = HashMap::new();

    for draft in &drafts {
        let key = (draft.symbol.clone(), draft.exchange);

        if draft.qty <= 0 || draft.qty % thresholds.lot_size != 0 {
            items.push(fail(
                "RISK_INVALID_QTY",
                format!("qty must be positive and a multiple of {}", thresholds.lot_size),
                Some(draft.draft_id),
            ));
            status = RiskStatus::Fail;
            continue;
        }

        let latest = match price_cache.get(&key) {
            Some(p) => Some(*p),
            None => {
                let p = bars.latest_close(&draft.symbol, draft.exchange, Adj::Qfq).await?;
                if let Some(p) = p {
                    price_cache.insert(key.clone(), p);
                }
                p
            }
        };
        let latest = match latest {
            Some(p) => p,
            None => {
                items.push(fail(
                    "DATA_NOT_READY",
                    format!("no latest price for {}.{}", draft.symbol, draft.exchange),
                    Some(draft.draft_id),
                ));
                status = RiskStatus::Fail;
                continue;
            }
        };

        let order_price = draft.price.unwrap_or(latest);
        let order_value = order_price * draft.qty as f64;

        if let Some(limit_price) = draft.price {
            let deviation = (limit_price - latest).abs() / latest;
            if deviation > thresholds.price_deviation_limit {
                items.push(warn(
                    "RISK_PRICE_DEVIATION",
                    format!("limit price deviates from latest close by {:.2}%", deviation * 100.0),
                    Some(draft.draft_id),
                ));
                status = worst_of(status, RiskStatus::Warn);
            }
        }

        if draft.side == Side::Buy {
            if let Some(last_trade_at) = sim.last_trade_at(portfolio_id, &draft.symbol, draft.exchange).await?
                && let Ok(last) = last_trade_at.parse::<chrono::DateTime<Utc>>()
            {
                let elapsed = (Utc::now() - last).num_seconds();
                if elapsed < thresholds.min_interval_seconds {
                    items.push(warn(
                        "RISK_ORDER_FREQUENCY",
                        format!("last order for {} was {elapsed}s ago, minimum interval is {}s", draft.symbol, thresholds.min_interval_seconds),
                        Some(draft.draft_id),
                    ));
                    status = worst_of(status, RiskStatus::Warn);
                }
            }
        }

        if let Some(limit_item) = price_limit_check(bars, &draft.symbol, draft.exchange, draft.side).await? {
            let level = limit_item.0.clone();
            items.push(RiskCheckItem {
                code: limit_item.1,
                level: level.clone(),
                message: limit_item.2,
                draft_id: Some(draft.draft_id),
            });
            status = if level == "FAIL" {
                RiskStatus::Fail
            } else {
                worst_of(status, RiskStatus::Warn)
            };
        }

        if draft.side == Side::Buy {
            let today_date = Utc::now().format("%Y-%m-%dT00:00:00").to_string();
            let traded_today = sim.traded_value_since(portfolio_id, &draft.symbol, draft.exchange, &today_date).await?;
            if traded_today + order_value > thresholds.max_daily_trading_value {
                items.push(warn(
                    "RISK_DAILY_VALUE_LIMIT",
                    format!("daily trading value {:.2} exceeds limit {:.2}", traded_today + order_value, thresholds.max_daily_trading_value),
                    Some(draft.draft_id),
                ));
                status = worst_of(status, RiskStatus::Warn);
            }
        }

        if order_value < thresholds.min_order_value {
            items.push(warn(
                "RISK_MIN_ORDER_VALUE",
                format!("order value {order_value:.2} below minimum {:.2}", thresholds.min_order_value),
                Some(draft.draft_id),
            ));
            status = worst_of(status, RiskStatus::Warn);
        }
        if order_value > thresholds.max_order_value {
            items.push(warn(
                "RISK_MAX_ORDER_VALUE",
                format!("order value {order_value:.2} exceeds limit {:.2}", thresholds.max_order_value),
                Some(draft.draft_id),
            ));
            status = worst_of(status, RiskStatus::Warn);
        }

        let cur_qty = *qty_map.get(&key).unwrap_or(&0);

        match draft.side {
            Side::Sell => {
                if draft.qty > cur_qty {
                    items.push(fail(
                        "RISK_SELL_QTY_EXCEEDS_POSITION",
                        "sell qty exceeds current position".to_string(),
                        Some(draft.draft_id),
                    ));
                    status = RiskStatus::Fail;
                    continue;
                }
                cash_now += order_value;
                qty_map.insert(key, cur_qty - draft.qty);
            }
            Side::Buy => {
                if order_value > cash_now {
                    items.push(fail(
                        "RISK_INSUFFICIENT_CASH",
                        "insufficient cash".to_string(),
                        Some(draft.draft_id),
                    ));
                    status = RiskStatus::Fail;
                    continue;
                }
                cash_now -= order_value;
                let new_qty = cur_qty + draft.qty;
                qty_map.insert(key.clone(), new_qty);

                if total_equity > 0.0 && (cash_now / total_equity) < thresholds.min_cash_ratio {
                    items.push(fail(
                        "RISK_MIN_CASH_RATIO",
                        "cash ratio after trades below minimum".to_string(),
                        Some(draft.draft_id),
                    ));
                    status = RiskStatus::Fail;
                    continue;
                }

                let pos_value = new_qty as f64 * latest;
                if total_equity > 0.0 && (pos_value / total_equity) > thresholds.max_position_per_symbol {
                    items.push(fail(
                        "RISK_POSITION_LIMIT",
                        "position size exceeds limit".to_string(),
                        Some(draft.draft_id),
                    ));
                    status = RiskStatus::Fail;
                }
            }
        }
    }

    if price_missing && status == RiskStatus::Pass {
        items.push(warn(
            "RISK_PRICE_MISSING_FOR_SOME_POSITIONS",
            "some positions missing latest price; risk checks are approximate".to_string(),
            None,
        ));
        status = RiskStatus::Warn;
    }

    let result = risk_repo
        .insert_result(portfolio_id, status, items, RULESET_VERSION, draft_ids)
        .await?;
    Ok(result)
}

async fn price_limit_check(
    bars: &BarsRepo<'_>,
    symbol: &str,
    exchange: Exchange,
    side: Side,
) -> anyhow::Result<Option<(String, String, String)>> {
    let recent = bars.list_recent(symbol, exchange, Adj::Qfq, 1).await?;
    let Some(bar) = recent.last() else {
        return Ok(None);
    };
    let Some(pre_close) = bar.pre_close else {
        return Ok(None);
    };
    if pre_close == 0.0 {
        return Ok(None);
    }
    let change_pct = (bar.close - pre_close) / pre_close;

    if change_pct >= 0.099 {
        let level = if side == Side::Sell { "WARN" } else { "FAIL" };
        return Ok(Some((
            level.to_string(),
            "RISK_LIMIT_UP".to_string(),
            format!("stock is at limit up price ({:.2}%)", change_pct * 100.0),
        )));
    }
    if change_pct <= -0.099 {
        let level = if side == Side::Buy { "WARN" } else { "FAIL" };
        return Ok(Some((
            level.to_string(),
            "RISK_LIMIT_DOWN".to_string(),
            format!("stock is at limit down price ({:.2}%)", change_pct * 100.0),
        )));
    }
    Ok(None)
}

fn fail(code: &str, message: String, draft_id: Option<Uuid>) -> RiskCheckItem {
    RiskCheckItem { code: code.to_string(), level: "FAIL".to_string(), message, draft_id }
}

fn warn(code: &str, message: String, draft_id: Option<Uuid>) -> RiskCheckItem {
    RiskCheckItem { code: code.to_string(), level: "WARN".to_string(), message, draft_id }
}

/// Resolves the overall batch status from its items, used by callers that
/// want to recompute status without re-running the simulation (e.g. display).
pub fn overall_status(items: &[RiskCheckItem]) -> RiskStatus {
    let mut status = RiskStatus::Pass;
    for item in items {
        status = worst_of(status, if item.level == "FAIL" { RiskStatus::Fail } else { RiskStatus::Warn });
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::BarDailyRow;
    use crate::infrastructure::persistence::Database;
    use chrono::NaiveDate;

    fn test_config() -> Config {
        Config {
            db_path: String::new(),
            provider_order: vec!["local".to_string()],
            provider_token: None,
            provider_base_url: None,
            max_workers: 1,
            http_addr: String::new(),
            risk_lot_size: 100,
            risk_deviation_limit: 0.03,
            risk_min_order_value: 1000.0,
            risk_max_order_value: 200_000.0,
            risk_min_cash_ratio: 0.05,
            risk_max_position_per_symbol: 0.25,
            risk_min_interval_seconds: 60,
            risk_max_daily_trading_value: 1_000_000.0,
            risk_max_orders_per_day: 50,
            sim_fee_rate: 0.0003,
            sim_slippage_rate: 0.0005,
            observability_enabled: false,
            observability_interval_seconds: 60,
        }
    }

    async fn seed_price(bars: &BarsRepo<'_>, symbol: &str, exchange: Exchange, close: f64) {
        bars.upsert_many(
            &[BarDailyRow {
                symbol: symbol.to_string(),
                exchange,
                trade_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
                adj: Adj::Qfq,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000_000.0,
                amount: 1_000_000.0 * close,
                pre_close: Some(close),
            }],
            "local",
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn invalid_qty_fails_the_batch() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let order_drafts = OrderDraftsRepo::new(&db.pool);
        let sim = SimRepo::new(&db.pool);
        let risk_repo = RiskRepo::new(&db.pool);

        let portfolio = portfolios.create("demo", "CNY", 1_000_000.0).await.unwrap();
        seed_price(&bars, "600519", Exchange::Sse, 1_000.0).await;
        let draft = order_drafts
            .create(portfolio.portfolio_id, "600519", Exchange::Sse, Side::Buy, "MARKET", None, 37, "manual")
            .await
            .unwrap();

        let result = check(
            &test_config(),
            &portfolios,
            &bars,
            &order_drafts,
            &sim,
            &risk_repo,
            portfolio.portfolio_id,
            vec![draft.draft_id],
        )
        .await
        .unwrap();

        assert_eq!(result.status, RiskStatus::Fail);
        assert!(result.items.iter().any(|i| i.code == "RISK_INVALID_QTY"));
    }

    #[tokio::test]
    async fn sufficient_cash_passes() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let order_drafts = OrderDraftsRepo::new(&db.pool);
        let sim = SimRepo::new(&db.pool);
        let risk_repo = RiskRepo::new(&db.pool);

        let portfolio = portfolios.create("demo", "CNY", 1_000_000.0).await.unwrap();
        seed_price(&bars, "600519", Exchange::Sse, 1_000.0).await;
        let draft = order_drafts
            .create(portfolio.portfolio_id, "600519", Exchange::Sse, Side::Buy, "MARKET", None, 100, "manual")
            .await
            .unwrap();

        let result = check(
            &test_config(),
            &portfolios,
            &bars,
            &order_drafts,
            &sim,
            &risk_repo,
            portfolio.portfolio_id,
            vec![draft.draft_id],
        )
        .await
        .unwrap();

        assert_ne!(result.status, RiskStatus::Fail);
    }

    #[tokio::test]
    async fn insufficient_cash_fails() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let order_drafts = OrderDraftsRepo::new(&db.pool);
        let sim = SimRepo::new(&db.pool);
        let risk_repo = RiskRepo::new(&db.pool);

        let portfolio = portfolios.create("demo", "CNY", 1_000.0).await.unwrap();
        seed_price(&bars, "600519", Exchange::Sse, 1_000.0).await;
        let draft = order_drafts
            .create(portfolio.portfolio_id, "600519", Exchange::Sse, Side::Buy, "MARKET", None, 100, "manual")
            .await
            .unwrap();

        let result = check(
            &test_config(),
            &portfolios,
            &bars,
            &order_drafts,
            &sim,
            &risk_repo,
            portfolio.portfolio_id,
            vec![draft.draft_id],
        )
        .await
        .unwrap();

        assert_eq!(result.status, RiskStatus::Fail);
        assert!(result.items.iter().any(|i| i.code == "RISK_INSUFFICIENT_CASH"));
    }

    #[tokio::test]
    async fn max_orders_per_day_counts_confirmed_fills_not_drafts() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let order_drafts = OrderDraftsRepo::new(&db.pool);
        let sim = SimRepo::new(&db.pool);
        let risk_repo = RiskRepo::new(&db.pool);

        let portfolio = portfolios.create("demo", "CNY", 1_000_000.0).await.unwrap();
        seed_price(&bars, "600519", Exchange::Sse, 1_000.0).await;

        // Create and delete a handful of drafts: under the old semantics this
        // alone would have bumped the counter.
        for _ in 0..3 {
            let draft = order_drafts
                .create(portfolio.portfolio_id, "600519", Exchange::Sse, Side::Buy, "MARKET", None, 100, "manual")
                .await
                .unwrap();
            order_drafts.delete(draft.draft_id).await.unwrap();
        }

        let mut cfg = test_config();
        cfg.risk_max_orders_per_day = 1;

        let draft = order_drafts
            .create(portfolio.portfolio_id, "600519", Exchange::Sse, Side::Buy, "MARKET", None, 100, "manual")
            .await
            .unwrap();

        let result = check(
            &cfg,
            &portfolios,
            &bars,
            &order_drafts,
            &sim,
            &risk_repo,
            portfolio.portfolio_id,
            vec![draft.draft_id],
        )
        .await
        .unwrap();

        assert!(!result.items.iter().any(|i| i.code == "RISK_MAX_ORDERS_PER_DAY"));

        let mut tx = db.pool.begin().await.unwrap();
        let order = sim
            .insert_order(&mut tx, portfolio.portfolio_id, vec![draft.draft_id], 100, 1000.0, 0.0, 0.0)
            .await
            .unwrap();
        sim.insert_trade(&mut tx, order.order_id, portfolio.portfolio_id, draft.draft_id, "600519", Exchange::Sse, Side::Buy, 100, 1000.0, 0.0, 0.0)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let result = check(
            &cfg,
            &portfolios,
            &bars,
            &order_drafts,
            &sim,
            &risk_repo,
            portfolio.portfolio_id,
            vec![draft.draft_id],
        )
        .await
        .unwrap();

        assert!(result.items.iter().any(|i| i.code == "RISK_MAX_ORDERS_PER_DAY"));
    }
}
