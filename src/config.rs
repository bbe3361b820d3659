use anyhow::{Context, Result};
use std::env;

/// Immutable application configuration, loaded once at boot from the environment.
///
/// Following the reference `Config::from_env()` idiom: a flat struct, every field
/// backed by `env::var(...).unwrap_or_else(...)` with a documented default.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub provider_order: Vec<String>,
    pub provider_token: Option<String>,
    pub provider_base_url: Option<String>,
    pub max_workers: usize,
    pub http_addr: String,

    pub risk_lot_size: i64,
    pub risk_deviation_limit: f64,
    pub risk_min_order_value: f64,
    pub risk_max_order_value: f64,
    pub risk_min_cash_ratio: f64,
    pub risk_max_position_per_symbol: f64,
    pub risk_min_interval_seconds: i64,
    pub risk_max_daily_trading_value: f64,
    pub risk_max_orders_per_day: i64,

    pub sim_fee_rate: f64,
    pub sim_slippage_rate: f64,

    pub observability_enabled: bool,
    pub observability_interval_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let db_path =
            env::var("WORKBENCH_DB_PATH").unwrap_or_else(|_| "./data/workbench.db".to_string());

        let provider_order: Vec<String> = env::var("WORKBENCH_PROVIDER_ORDER")
            .unwrap_or_else(|_| "local".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let provider_token = env::var("WORKBENCH_PROVIDER_TOKEN").ok();
        let provider_base_url = env::var("WORKBENCH_PROVIDER_BASE_URL").ok();

        let max_workers = env::var("WORKBENCH_MAX_WORKERS")
            .unwrap_or_else(|_| "4".to_string())
            .parse::<usize>()
            .context("Failed to parse WORKBENCH_MAX_WORKERS")?;

        let http_addr =
            env::var("WORKBENCH_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let risk_lot_size = parse_env("RISK_LOT_SIZE", 100)?;
        let risk_deviation_limit = parse_env("RISK_DEVIATION_LIMIT", 0.05)?;
        let risk_min_order_value = parse_env("RISK_MIN_ORDER_VALUE", 1_000.0)?;
        let risk_max_order_value = parse_env("RISK_MAX_ORDER_VALUE", 5_000_000.0)?;
        let risk_min_cash_ratio = parse_env("RISK_MIN_CASH_RATIO", 0.05)?;
        let risk_max_position_per_symbol = parse_env("RISK_MAX_POSITION_PER_SYMBOL", 0.3)?;
        let risk_min_interval_seconds = parse_env("RISK_MIN_INTERVAL_SECONDS", 3)?;
        let risk_max_daily_trading_value = parse_env("RISK_MAX_DAILY_TRADING_VALUE", 10_000_000.0)?;
        let risk_max_orders_per_day = parse_env("RISK_MAX_ORDERS_PER_DAY", 50)?;

        let sim_fee_rate = parse_env("SIM_FEE_RATE", 0.0003)?;
        let sim_slippage_rate = parse_env("SIM_SLIPPAGE_RATE", 0.0005)?;

        let observability_enabled = env::var("OBSERVABILITY_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);
        let observability_interval_seconds = parse_env("OBSERVABILITY_INTERVAL_SECONDS", 60)?;

        Ok(Self {
            db_path,
            provider_order,
            provider_token,
            provider_base_url,
            max_workers,
            http_addr,
            risk_lot_size,
            risk_deviation_limit,
            risk_min_order_value,
            risk_max_order_value,
            risk_min_cash_ratio,
            risk_max_position_per_symbol,
            risk_min_interval_seconds,
            risk_max_daily_trading_value,
            risk_max_orders_per_day,
            sim_fee_rate,
            sim_slippage_rate,
            observability_enabled,
            observability_interval_seconds,
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("failed to parse {key}={v}: {e}")),
        Err(_) => Ok(default),
    }
}
