//! Simulated execution: turns a passed risk check into an atomic multi-leg fill.

use uuid::Uuid;

use crate::config::Config;
use crate::domain::models::{OrderDraft, SimOrder, SimTrade};
use crate::domain::types::{Adj, RiskStatus, Side};
use crate::errors::AppError;
use crate::repo::bars::BarsRepo;
use crate::repo::order_drafts::OrderDraftsRepo;
use crate::repo::portfolios::PortfoliosRepo;
use crate::repo::risk::RiskRepo;
use crate::repo::sim::SimRepo;

pub struct ConfirmOutcome {
    pub order: SimOrder,
    pub trades: Vec<SimTrade>,
}

#[allow(clippy::too_many_arguments)]
pub async fn confirm(
    cfg: &Config,
    portfolios: &PortfoliosRepo<'_>,
    bars: &BarsRepo<'_>,
    order_drafts_repo: &OrderDraftsRepo<'_>,
    risk_repo: &RiskRepo<'_>,
    sim: &SimRepo<'_>,
    portfolio_id: Uuid,
    riskcheck_id: Uuid,
) -> Result<ConfirmOutcome, AppError> {
    let risk_result = risk_repo
        .get_result(riskcheck_id)
        .await?
        .ok_or_else(|| AppError::validation("riskcheck_id not found"))?;
    if risk_result.status == RiskStatus::Fail {
        return Err(AppError::RiskCheckFail("riskcheck is FAIL".to_string()));
    }
    if risk_result.portfolio_id != portfolio_id {
        return Err(AppError::validation("riskcheck does not belong to this portfolio"));
    }

    let drafts = order_drafts_repo.get_many(&risk_result.input_draft_ids).await?;
    if drafts.len() != risk_result.input_draft_ids.len() {
        return Err(AppError::validation("one or more order drafts no longer exist"));
    }

    let portfolio = portfolios
        .get(portfolio_id)
        .await?
        .ok_or_else(|| AppError::validation("unknown portfolio"))?;

    let mut cash = portfolio.cash;
    let mut fee_total = 0.0;
    let mut slippage_total = 0.0;
    let mut filled_qty_total: i64 = 0;
    let mut fill_value_total = 0.0;

    let mut legs: Vec<(OrderDraft, f64, f64, f64)> = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        let base_price = bars
            .latest_close(&draft.symbol, draft.exchange, Adj::Qfq)
            .await?
            .ok_or_else(|| AppError::data_not_ready(format!("no latest price for {}.{}", draft.symbol, draft.exchange), "ingest_bars_daily"))?;

        let fill_price = draft.price.unwrap_or(base_price);
        let slippage = base_price * cfg.sim_slippage_rate * draft.qty as f64;
        let fee = fill_price * draft.qty as f64 * cfg.sim_fee_rate;

        let leg_value = fill_price * draft.qty as f64;
        match draft.side {
            Side::Buy => cash -= leg_value + fee + slippage,
            Side::Sell => cash += leg_value - fee - slippage,
        }
        if cash < 0.0 {
            return Err(AppError::validation("simulated cash would go negative"));
        }

        fee_total += fee;
        slippage_total += slippage;
        filled_qty_total += draft.qty;
        fill_value_total += leg_value;

        legs.push((draft.clone(), fill_price, fee, slippage));
    }

    let avg_fill_price = if filled_qty_total > 0 { fill_value_total / filled_qty_total as f64 } else { 0.0 };

    let mut tx = sim.pool().begin().await.map_err(anyhow::Error::from)?;

    let order = sim
        .insert_order(
            &mut tx,
            portfolio_id,
            drafts.iter().map(|d| d.draft_id).collect(),
            filled_qty_total,
            avg_fill_price,
            fee_total,
            slippage_total,
        )
        .await?;

    let mut trades = Vec::with_capacity(legs.len());
    for (draft, fill_price, fee, slippage) in &legs {
        let trade = sim
            .insert_trade(
                &mut tx,
                order.order_id,
                portfolio_id,
                draft.draft_id,
                &draft.symbol,
                draft.exchange,
                draft.side,
                draft.qty,
                *fill_price,
                *fee,
                *slippage,
            )
            .await?;
        trades.push(trade);
    }

    for (draft, fill_price, _, _) in &legs {
        let qty_delta = match draft.side {
            Side::Buy => draft.qty,
            Side::Sell => -draft.qty,
        };
        portfolios
            .apply_fill_in_tx(&mut tx, portfolio_id, &draft.symbol, draft.exchange, qty_delta, *fill_price)
            .await?;
    }
    portfolios.set_cash_in_tx(&mut tx, portfolio_id, cash).await?;

    tx.commit().await.map_err(anyhow::Error::from)?;

    Ok(ConfirmOutcome { order, trades })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::BarDailyRow;
    use crate::domain::types::Exchange;
    use crate::infrastructure::persistence::Database;
    use crate::repo::risk::RiskRepo as RiskRepoAlias;
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

    #[tokio::test]
    async fn confirm_fills_a_buy_and_debits_cash() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let order_drafts = OrderDraftsRepo::new(&db.pool);
        let risk_repo = RiskRepoAlias::new(&db.pool);
        let sim = SimRepo::new(&db.pool);

        let portfolio = portfolios.create("demo", "CNY", 1_000_000.0).await.unwrap();
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

        let draft = order_drafts
            .create(portfolio.portfolio_id, "600519", Exchange::Sse, Side::Buy, "MARKET", None, 100, "manual")
            .await
            .unwrap();
        let riskcheck = risk_repo
            .insert_result(portfolio.portfolio_id, RiskStatus::Pass, vec![], "risk/v1", vec![draft.draft_id])
            .await
            .unwrap();

        let outcome = confirm(
            &test_config(),
            &portfolios,
            &bars,
            &order_drafts,
            &risk_repo,
            &sim,
            portfolio.portfolio_id,
            riskcheck.riskcheck_id,
        )
        .await
        .unwrap();

        assert_eq!(outcome.order.filled_qty, 100);
        assert_eq!(outcome.trades.len(), 1);

        let updated = portfolios.get(portfolio.portfolio_id).await.unwrap().unwrap();
        assert!(updated.cash < 1_000_000.0 - 100_000.0);

        let positions = portfolios.list_positions(portfolio.portfolio_id).await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].qty, 100);
    }

    #[tokio::test]
    async fn confirm_rejects_a_failed_riskcheck() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);
        let order_drafts = OrderDraftsRepo::new(&db.pool);
        let risk_repo = RiskRepoAlias::new(&db.pool);
        let sim = SimRepo::new(&db.pool);

        let portfolio = portfolios.create("demo", "CNY", 1_000_000.0).await.unwrap();
        let draft = order_drafts
            .create(portfolio.portfolio_id, "600519", Exchange::Sse, Side::Buy, "MARKET", None, 100, "manual")
            .await
            .unwrap();
        let riskcheck = risk_repo
            .insert_result(portfolio.portfolio_id, RiskStatus::Fail, vec![], "risk/v1", vec![draft.draft_id])
            .await
            .unwrap();

        let result = confirm(
            &test_config(),
            &portfolios,
            &bars,
            &order_drafts,
            &risk_repo,
            &sim,
            portfolio.portfolio_id,
            riskcheck.riskcheck_id,
        )
        .await;

        assert!(matches!(result, Err(AppError::RiskCheckFail(_))));
    }
}
