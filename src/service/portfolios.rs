//! Portfolio mark-to-market view: prices positions at latest close and derives
//! equity, cash ratio, and per-position weight for the read-side API.

use uuid::Uuid;

use crate::domain::models::{PortfolioView, PositionView};
use crate::domain::types::Adj;
use crate::errors::AppError;
use crate::repo::bars::BarsRepo;
use crate::repo::portfolios::PortfoliosRepo;

pub async fn build_view(portfolios: &PortfoliosRepo<'_>, bars: &BarsRepo<'_>, portfolio_id: Uuid) -> Result<PortfolioView, AppError> {
    let portfolio = portfolios
        .get(portfolio_id)
        .await?
        .ok_or_else(|| AppError::validation("unknown portfolio"))?;
    let positions = portfolios.list_positions(portfolio_id).await?;

    let mut position_views = Vec::with_capacity(positions.len());
    let mut missing_prices = Vec::new();
    let mut market_value_total = 0.0;

    for position in positions {
        let latest_close = bars.latest_close(&position.symbol, position.exchange, Adj::Qfq).await?;
        let market_value = latest_close.map(|price| price * position.qty as f64);
        let cost_basis = position.avg_cost * position.qty as f64;
        let unrealized_pnl = market_value.map(|mv| mv - cost_basis);
        let unrealized_pnl_pct = unrealized_pnl.filter(|_| cost_basis != 0.0).map(|pnl| pnl / cost_basis);

        match market_value {
            Some(mv) => market_value_total += mv,
            None => missing_prices.push(format!("{}.{}", position.symbol, position.exchange)),
        }

        position_views.push(PositionView {
            position,
            latest_close,
            market_value,
            unrealized_pnl,
            unrealized_pnl_pct,
            weight: None,
        });
    }

    let total_equity = portfolio.cash + market_value_total;
    for view in &mut position_views {
        view.weight = view.market_value.filter(|_| total_equity > 0.0).map(|mv| mv / total_equity);
    }
    let cash_ratio = if total_equity > 0.0 { portfolio.cash / total_equity } else { 0.0 };

    Ok(PortfolioView {
        portfolio,
        positions: position_views,
        total_equity,
        cash_ratio,
        missing_prices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::BarDailyRow;
    use crate::domain::types::Exchange;
    use crate::infrastructure::persistence::Database;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn prices_positions_at_latest_close_and_computes_weight() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);

        let portfolio = portfolios.create("demo", "CNY", 100_000.0).await.unwrap();
        portfolios.apply_fill(portfolio.portfolio_id, "600519", Exchange::Sse, 100, 1000.0).await.unwrap();
        bars.upsert_many(
            &[BarDailyRow {
                symbol: "600519".to_string(),
                exchange: Exchange::Sse,
                trade_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
                adj: Adj::Qfq,
                open: 1100.0,
                high: 1100.0,
                low: 1100.0,
                close: 1100.0,
                volume: 1.0,
                amount: 1.0,
                pre_close: Some(1000.0),
            }],
            "local",
        )
        .await
        .unwrap();

        let view = build_view(&portfolios, &bars, portfolio.portfolio_id).await.unwrap();
        assert_eq!(view.positions.len(), 1);
        assert_eq!(view.positions[0].market_value, Some(110_000.0));
        assert_eq!(view.positions[0].unrealized_pnl, Some(10_000.0));
        assert!(view.missing_prices.is_empty());
        assert_eq!(view.total_equity, 100_000.0 + 110_000.0);
    }

    #[tokio::test]
    async fn missing_price_is_reported_and_excluded_from_equity() {
        let db = Database::new_in_memory().await.unwrap();
        let portfolios = PortfoliosRepo::new(&db.pool);
        let bars = BarsRepo::new(&db.pool);

        let portfolio = portfolios.create("demo", "CNY", 50_000.0).await.unwrap();
        portfolios.apply_fill(portfolio.portfolio_id, "000001", Exchange::Szse, 100, 8.0).await.unwrap();

        let view = build_view(&portfolios, &bars, portfolio.portfolio_id).await.unwrap();
        assert_eq!(view.missing_prices, vec!["000001.SZSE".to_string()]);
        assert_eq!(view.total_equity, 50_000.0);
    }
}
