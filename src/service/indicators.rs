//! Technical indicators computed from a close-price series.
//!
//! Every series output is aligned one-to-one with the input bars: an undefined
//! prefix position (not enough history for the window) is `None`, never NaN.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::models::BarDaily;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SeriesPoint {
    pub trade_date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MacdPoint {
    pub trade_date: NaiveDate,
    pub dif: Option<f64>,
    pub dea: Option<f64>,
    pub hist: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Indicators {
    pub ma20: Vec<SeriesPoint>,
    pub ma60: Vec<SeriesPoint>,
    pub rsi14: Vec<SeriesPoint>,
    pub macd: Vec<MacdPoint>,
    pub bollinger: Vec<BollingerPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BollingerPoint {
    pub trade_date: NaiveDate,
    pub upper: Option<f64>,
    pub middle: Option<f64>,
    pub lower: Option<f64>,
}

/// Simple moving average; `None` for the first `window - 1` positions.
pub fn rolling_mean(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    if closes.len() < window || window == 0 {
        return vec![None; closes.len()];
    }
    let mut out = vec![None; closes.len()];
    let mut sum: f64 = closes[..window].iter().sum();
    out[window - 1] = Some(sum / window as f64);
    for i in window..closes.len() {
        sum += closes[i] - closes[i - window];
        out[i] = Some(sum / window as f64);
    }
    out
}

fn rolling_std(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    if closes.len() < window || window == 0 {
        return vec![None; closes.len()];
    }
    let means = rolling_mean(closes, window);
    let mut out = vec![None; closes.len()];
    for i in (window - 1)..closes.len() {
        let mean = means[i].unwrap();
        let variance: f64 = closes[(i + 1 - window)..=i]
            .iter()
            .map(|c| (c - mean).powi(2))
            .sum::<f64>()
            / window as f64;
        out[i] = Some(variance.sqrt());
    }
    out
}

/// RSI(period) with Wilder smoothing after the initial simple average seed.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    if n < period + 1 {
        return vec![None; n];
    }

    let mut out = vec![None; n];
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = deltas.iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|d| (-d).max(0.0)).collect();

    let mut avg_gain: f64 = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[..period].iter().sum::<f64>() / period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in (period + 1)..n {
        let gain = gains[i - 1];
        let loss = losses[i - 1];
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Exponential moving average; first point seeds at the first input value.
pub fn ema(values: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    if values.is_empty() {
        return Vec::new();
    }
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = vec![None; values.len()];
    let mut prev: Option<f64> = None;
    for (i, v) in values.iter().enumerate() {
        match (v, prev) {
            (Some(x), None) => {
                out[i] = Some(*x);
                prev = Some(*x);
            }
            (Some(x), Some(p)) => {
                let next = alpha * x + (1.0 - alpha) * p;
                out[i] = Some(next);
                prev = Some(next);
            }
            (None, _) => out[i] = None,
        }
    }
    out
}

pub fn compute(bars: &[BarDaily]) -> Indicators {
    let dates: Vec<NaiveDate> = bars.iter().map(|b| b.trade_date).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let ma20 = rolling_mean(&closes, 20);
    let ma60 = rolling_mean(&closes, 60);
    let rsi14 = rsi(&closes, 14);

    let closes_opt: Vec<Option<f64>> = closes.iter().map(|c| Some(*c)).collect();
    let ema12 = ema(&closes_opt, 12);
    let ema26 = ema(&closes_opt, 26);
    let dif: Vec<Option<f64>> = ema12
        .iter()
        .zip(ema26.iter())
        .map(|(a, b)| match (a, b) {
            (Some(x), Some(y)) => Some(x - y),
            _ => None,
        })
        .collect();
    let dea = ema(&dif, 9);
    let hist: Vec<Option<f64>> = dif
        .iter()
        .zip(dea.iter())
        .map(|(a, b)| match (a, b) {
            (Some(x), Some(y)) => Some((x - y) * 2.0),
            _ => None,
        })
        .collect();

    let boll_mid = rolling_mean(&closes, 20);
    let boll_std = rolling_std(&closes, 20);
    let bollinger = dates
        .iter()
        .zip(boll_mid.iter())
        .zip(boll_std.iter())
        .map(|((date, mid), std)| match (mid, std) {
            (Some(m), Some(s)) => BollingerPoint {
                trade_date: *date,
                upper: Some(m + 2.0 * s),
                middle: Some(*m),
                lower: Some(m - 2.0 * s),
            },
            _ => BollingerPoint {
                trade_date: *date,
                upper: None,
                middle: None,
                lower: None,
            },
        })
        .collect();

    let pack = |values: &[Option<f64>]| {
        dates
            .iter()
            .zip(values.iter())
            .map(|(date, value)| SeriesPoint {
                trade_date: *date,
                value: *value,
            })
            .collect::<Vec<_>>()
    };

    let macd = dates
        .iter()
        .enumerate()
        .map(|(i, date)| MacdPoint {
            trade_date: *date,
            dif: dif[i],
            dea: dea[i],
            hist: hist[i],
        })
        .collect();

    Indicators {
        ma20: pack(&ma20),
        ma60: pack(&ma60),
        rsi14: pack(&rsi14),
        macd,
        bollinger,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_is_none_before_window_fills() {
        let closes = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ma3 = rolling_mean(&closes, 3);
        assert_eq!(ma3, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn rsi_returns_100_when_there_are_no_losses() {
        let closes: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let values = rsi(&closes, 14);
        assert_eq!(values[14], Some(100.0));
    }

    #[test]
    fn ema_seeds_at_first_value() {
        let values = vec![Some(10.0), Some(12.0), Some(14.0)];
        let result = ema(&values, 2);
        assert_eq!(result[0], Some(10.0));
        assert!(result[1].unwrap() > 10.0);
    }
}
