//! Rebalance planner: turns target weights into lot-rounded order drafts.

use std::collections::HashMap;

use serde::Deserialize;
use uuid::Uuid;

use crate::domain::models::OrderDraft;
use crate::domain::types::{Exchange, Side};
use crate::errors::AppError;
use crate::repo::bars::BarsRepo;
use crate::repo::order_drafts::OrderDraftsRepo;
use crate::repo::portfolios::PortfoliosRepo;

#[derive(Debug, Clone, Deserialize)]
pub struct TargetWeight {
    pub symbol: String,
    pub exchange: Exchange,
    pub weight: f64,
}

pub struct RebalanceInputs {
    pub portfolio_id: Uuid,
    pub targets: Vec<TargetWeight>,
    pub cash_reserve_ratio: f64,
    pub lot_size: i64,
}

/// Outcome of a rebalance plan: the drafts created plus the equity/cash
/// context they were sized against, so a caller can show the trade-off
/// without re-deriving it from the portfolio.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RebalanceResult {
    pub orders: Vec<OrderDraft>,
    pub total_equity: f64,
    pub cash_before: f64,
    pub cash_after_est: f64,
    pub cash_reserve_ratio: f64,
    pub missing_prices: Vec<String>,
}

/// Builds the rebalance order drafts and persists them.
///
/// Targets are normalized to sum to 1.0 before the investable amount is split.
/// A target whose implied move is smaller than one lot at the current price is
/// skipped rather than rounded, since it would be a no-op trade anyway.
pub async fn plan(
    portfolios: &PortfoliosRepo<'_>,
    bars: &BarsRepo<'_>,
    order_drafts: &OrderDraftsRepo<'_>,
    inputs: RebalanceInputs,
) -> Result<RebalanceResult, AppError> {
    let portfolio = portfolios
        .get(inputs.portfolio_id)
        .await?
        .ok_or_else(|| AppError::validation("unknown portfolio"))?;
    let positions = portfolios.list_positions(inputs.portfolio_id).await?;

    let mut prices: HashMap<(String, Exchange), f64> = HashMap::new();
    let mut missing_prices: Vec<String> = Vec::new();
    for position in &positions {
        match bars
            .latest_close(&position.symbol, position.exchange, crate::domain::types::Adj::Qfq)
            .await?
        {
            Some(close) => {
                prices.insert((position.symbol.clone(), position.exchange), close);
            }
            None => missing_prices.push(position.symbol.clone()),
        }
    }
    for target in &inputs.targets {
        if let std::collections::hash_map::Entry::Vacant(slot) =
            prices.entry((target.symbol.clone(), target.exchange))
        {
            match bars.latest_close(&target.symbol, target.exchange, crate::domain::types::Adj::Qfq).await? {
                Some(close) => {
                    slot.insert(close);
                }
                None => missing_prices.push(target.symbol.clone()),
            }
        }
    }
    missing_prices.sort();
    missing_prices.dedup();

    let position_value: f64 = positions
        .iter()
        .filter_map(|p| prices.get(&(p.symbol.clone(), p.exchange)).map(|price| price * p.qty as f64))
        .sum();
    let total_equity = portfolio.cash + position_value;

    let weight_sum: f64 = inputs.targets.iter().map(|t| t.weight).sum();
    if weight_sum <= 0.0 {
        return Err(AppError::validation("target weights must sum to a positive amount"));
    }

    let investable = total_equity * (1.0 - inputs.cash_reserve_ratio);

    let mut current_qty: HashMap<(String, Exchange), i64> = HashMap::new();
    for position in &positions {
        current_qty.insert((position.symbol.clone(), position.exchange), position.qty);
    }

    let mut drafts = Vec::new();
    let mut cash_after_est = portfolio.cash;
    for target in &inputs.targets {
        let key = (target.symbol.clone(), target.exchange);
        let price = match prices.get(&key) {
            Some(p) => *p,
            None => continue,
        };
        let normalized_weight = target.weight / weight_sum;
        let target_value = investable * normalized_weight;
        let held_qty = *current_qty.get(&key).unwrap_or(&0);
        let held_value = held_qty as f64 * price;
        let delta_value = target_value - held_value;

        let lot_value = price * inputs.lot_size as f64;
        if delta_value.abs() < lot_value {
            continue;
        }

        let lots = (delta_value.abs() / lot_value).floor() as i64;
        if lots <= 0 {
            continue;
        }
        let mut qty = lots * inputs.lot_size;
        let side = if delta_value > 0.0 { Side::Buy } else { Side::Sell };

        if side == Side::Sell {
            qty = qty.min(held_qty);
            if qty <= 0 {
                continue;
            }
        }

        let order_value = qty as f64 * price;
        match side {
            Side::Buy => cash_after_est -= order_value,
            Side::Sell => cash_after_est += order_value,
        }

        let draft = order_drafts
            .create(
                inputs.portfolio_id,
                &target.symbol,
                target.exchange,
                side,
                "MARKET",
                None,
                qty,
                "rebalance",
            )
            .await?;
        drafts.push(draft);
    }

    Ok(RebalanceResult {
        orders: drafts,
        total_equity,
        cash_before: portfolio.cash,
        cash_after_est,
        cash_reserve_ratio: inputs.cash_reserve_ratio,
        missing_prices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::BarDailyRow;
    use crate::infrastructure::persistence::Database;
    use chrono::NaiveDate;

    async fn seed_price(bars: &BarsRepo<'_>, symbol: &str, exchange: Exchange, close: f64) {
        bars.upsert_many(
            &[BarDailyRow {
                symbol: symbol.to_string(),
                exchange,
                trade_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
                adj: crate::domain::types::Adj::Qfq,
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
    async fn plan_buys_towards_target_weight_in_whole_lots() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let order_drafts = OrderDraftsRepo::new(&db.pool);

        let portfolio = portfolios.create("demo", "CNY", 1_000_000.0).await.unwrap();
        seed_price(&bars, "600519", Exchange::Sse, 1_000.0).await;

        let result = plan(
            &portfolios,
            &bars,
            &order_drafts,
            RebalanceInputs {
                portfolio_id: portfolio.portfolio_id,
                targets: vec![TargetWeight {
                    symbol: "600519".to_string(),
                    exchange: Exchange::Sse,
                    weight: 1.0,
                }],
                cash_reserve_ratio: 0.1,
                lot_size: 100,
            },
        )
        .await
        .unwrap();

        assert_eq!(result.orders.len(), 1);
        assert_eq!(result.orders[0].side, Side::Buy);
        assert_eq!(result.orders[0].qty % 100, 0);
        assert!(result.orders[0].qty > 0);
        assert_eq!(result.total_equity, 1_000_000.0);
        assert!(result.cash_after_est < result.cash_before);
        assert!(result.missing_prices.is_empty());
    }

    #[tokio::test]
    async fn plan_caps_sell_qty_at_current_holdings() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let order_drafts = OrderDraftsRepo::new(&db.pool);

        let portfolio = portfolios.create("demo", "CNY", 10_000.0).await.unwrap();
        seed_price(&bars, "600519", Exchange::Sse, 1_000.0).await;
        portfolios.apply_fill(portfolio.portfolio_id, "600519", Exchange::Sse, 100, 1_000.0).await.unwrap();

        let result = plan(
            &portfolios,
            &bars,
            &order_drafts,
            RebalanceInputs {
                portfolio_id: portfolio.portfolio_id,
                targets: vec![TargetWeight {
                    symbol: "600519".to_string(),
                    exchange: Exchange::Sse,
                    weight: 1.0,
                }],
                cash_reserve_ratio: 2.0,
                lot_size: 100,
            },
        )
        .await
        .unwrap();

        assert_eq!(result.orders.len(), 1);
        assert_eq!(result.orders[0].side, Side::Sell);
        assert_eq!(result.orders[0].qty, 100);
    }

    #[tokio::test]
    async fn plan_skips_moves_smaller_than_one_lot() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let order_drafts = OrderDraftsRepo::new(&db.pool);

        let portfolio = portfolios.create("demo", "CNY", 100.0).await.unwrap();
        seed_price(&bars, "600519", Exchange::Sse, 1_000.0).await;

        let result = plan(
            &portfolios,
            &bars,
            &order_drafts,
            RebalanceInputs {
                portfolio_id: portfolio.portfolio_id,
                targets: vec![TargetWeight {
                    symbol: "600519".to_string(),
                    exchange: Exchange::Sse,
                    weight: 1.0,
                }],
                cash_reserve_ratio: 0.0,
                lot_size: 100,
            },
        )
        .await
        .unwrap();

        assert!(result.orders.is_empty());
    }
}
