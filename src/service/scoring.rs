//! Explainable deterministic scoring, ruleset `score/tech_v1`.

use serde_json::{Value, json};

use crate::domain::models::BarDaily;
use crate::errors::AppError;

pub const RULESET_VERSION: &str = "score/tech_v1";
const MIN_BARS: usize = 60;

pub struct ScoreOutcome {
    pub score_total: f64,
    pub breakdown: Value,
    pub reasons: Vec<String>,
    pub data_version: Value,
}

pub fn score(bars: &[BarDaily]) -> Result<ScoreOutcome, AppError> {
    if bars.len() < MIN_BARS {
        return Err(AppError::data_not_ready(
            format!("need at least {MIN_BARS} bars, have {}", bars.len()),
            "ingest_bars_daily",
        ));
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let n = closes.len();
    let last = closes[n - 1];

    let ma20 = closes[n - 20..].iter().sum::<f64>() / 20.0;
    let ma60 = closes[n - 60..].iter().sum::<f64>() / 60.0;

    let ret20 = (last - closes[n - 21]) / closes[n - 21];

    let log_returns: Vec<f64> = closes[n - 21..]
        .windows(2)
        .map(|w| (w[1] / w[0]).ln())
        .collect();
    let mean_lr = log_returns.iter().sum::<f64>() / log_returns.len() as f64;
    let variance = log_returns.iter().map(|r| (r - mean_lr).powi(2)).sum::<f64>() / log_returns.len() as f64;
    let sigma = variance.sqrt();

    let avg_amount = bars[n - 20..].iter().map(|b| b.amount).sum::<f64>() / 20.0;

    let mut raw: f64 = 0.0;
    let mut reasons = Vec::new();

    let mut trend = 0.0;
    if last > ma20 {
        trend += 10.0;
        reasons.push("last>MA20".to_string());
    }
    if ma20 > ma60 {
        trend += 10.0;
        reasons.push("MA20>MA60".to_string());
    }
    if last > ma60 {
        trend += 10.0;
        reasons.push("last>MA60".to_string());
    }
    raw += trend;

    let mut momentum = 0.0;
    if ret20 > 0.0 {
        momentum += 10.0;
        reasons.push("ret20>0".to_string());
    }
    if ret20 > 0.10 {
        momentum += 10.0;
        reasons.push("ret20>0.10".to_string());
    }
    raw += momentum;

    let volatility = if sigma < 0.03 {
        reasons.push("sigma<0.03".to_string());
        10.0
    } else if sigma < 0.06 {
        reasons.push("sigma<0.06".to_string());
        5.0
    } else {
        0.0
    };
    raw += volatility;

    let liquidity = if avg_amount > 1e8 {
        reasons.push("avg_amount>1e8".to_string());
        10.0
    } else if avg_amount > 2e7 {
        reasons.push("avg_amount>2e7".to_string());
        5.0
    } else {
        0.0
    };
    raw += liquidity;

    let score_total = (raw * 2.0).clamp(0.0, 100.0);

    let breakdown = json!({
        "trend": trend,
        "momentum": momentum,
        "volatility": volatility,
        "liquidity": liquidity,
        "last_close": last,
        "ma20": ma20,
        "ma60": ma60,
        "ret20": ret20,
        "sigma21": sigma,
        "avg_amount20": avg_amount,
    });

    let data_version = json!({
        "bars_trade_date": bars[n - 1].trade_date,
        "bars_count": n,
    });

    Ok(ScoreOutcome {
        score_total,
        breakdown,
        reasons,
        data_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Adj, Exchange};
    use chrono::{NaiveDate, Utc};

    fn bar(day: i64, close: f64) -> BarDaily {
        BarDaily {
            symbol: "600519".to_string(),
            exchange: Exchange::Sse,
            trade_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + chrono::Duration::days(day),
            adj: Adj::Qfq,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000_000.0,
            amount: 1_500_000_000.0,
            pre_close: Some(close),
            source: "local".to_string(),
            quality: "OK".to_string(),
            ingested_at: Utc::now(),
        }
    }

    #[test]
    fn fewer_than_sixty_bars_is_not_ready() {
        let bars: Vec<BarDaily> = (0..59).map(|i| bar(i, 1000.0)).collect();
        let result = score(&bars);
        assert!(matches!(result, Err(AppError::DataNotReady { .. })));
    }

    #[test]
    fn constant_close_scores_only_liquidity() {
        let bars: Vec<BarDaily> = (0..60).map(|i| bar(i, 1000.0)).collect();
        let outcome = score(&bars).unwrap();
        assert_eq!(outcome.breakdown["trend"], 0.0);
        assert_eq!(outcome.breakdown["liquidity"], 10.0);
        assert!((0.0..=100.0).contains(&outcome.score_total));
    }

    #[test]
    fn uptrend_scores_higher_than_flat() {
        let flat: Vec<BarDaily> = (0..60).map(|i| bar(i, 1000.0)).collect();
        let rising: Vec<BarDaily> = (0..60).map(|i| bar(i, 1000.0 + i as f64 * 5.0)).collect();
        let flat_score = score(&flat).unwrap().score_total;
        let rising_score = score(&rising).unwrap().score_total;
        assert!(rising_score > flat_score);
    }
}
