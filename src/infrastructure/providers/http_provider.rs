//! Generic REST-JSON provider, standing in for a real upstream market data
//! vendor (tushare/akshare-like). Every call is gated behind a circuit breaker
//! and a fixed timeout so a flaky upstream degrades the registry's fallback
//! instead of hanging a worker.

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use crate::domain::models::{CapitalFlowDaily, FundamentalSnapshot};
use crate::domain::ports::{BarDailyRow, DataProvider, InstrumentRow, ProviderStatus};
use crate::domain::types::{Adj, Exchange};
use crate::infrastructure::core::{CircuitBreaker, CircuitBreakerError, HttpClientFactory};
use crate::infrastructure::core::http_client_factory::build_url_with_query;

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpProvider {
    base_url: Option<String>,
    token: Option<String>,
    client: ClientWithMiddleware,
    breaker: CircuitBreaker,
}

impl HttpProvider {
    pub fn new(base_url: Option<String>, token: Option<String>) -> Self {
        Self {
            base_url,
            token,
            client: HttpClientFactory::create_client(),
            breaker: CircuitBreaker::new("http_provider", 5, 2, Duration::from_secs(30)),
        }
    }

    fn configured(&self) -> bool {
        self.base_url.is_some()
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let base_url = self
            .base_url
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("http provider has no base url configured"))?;

        let url = build_url_with_query(&format!("{base_url}{path}"), params);
        let client = &self.client;
        let token = self.token.clone();

        let result = self
            .breaker
            .call(async move {
                let mut request = client.get(&url);
                if let Some(token) = &token {
                    request = request.bearer_auth(token);
                }
                let response = tokio::time::timeout(CALL_TIMEOUT, request.send())
                    .await
                    .map_err(|_| anyhow::anyhow!("provider call timed out after {CALL_TIMEOUT:?}"))??;
                let response = response.error_for_status()?;
                let body: T = response.json().await?;
                Ok::<T, anyhow::Error>(body)
            })
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::Open(message)) => Err(anyhow::anyhow!(message)),
            Err(CircuitBreakerError::Inner(e)) => Err(e),
        }
    }
}

#[async_trait]
impl DataProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn status(&self) -> ProviderStatus {
        let circuit_state = self.breaker.state().await;
        ProviderStatus {
            ok: self.configured() && circuit_state != crate::infrastructure::core::CircuitState::Open,
            details: json!({
                "base_url_set": self.base_url.is_some(),
                "token_set": self.token.is_some(),
                "circuit_state": format!("{circuit_state:?}"),
                "last_error": self.breaker.last_error().await,
            }),
        }
    }

    async fn iter_instruments(&self) -> anyhow::Result<Vec<InstrumentRow>> {
        self.get_json("/instruments", &[]).await
    }

    async fn fetch_bars_daily(
        &self,
        symbol: &str,
        exchange: Exchange,
        start_date: Option<chrono::NaiveDate>,
        end_date: Option<chrono::NaiveDate>,
        adj: Adj,
    ) -> anyhow::Result<Vec<BarDailyRow>> {
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("exchange", exchange.to_string()),
            ("adj", adj.to_string()),
        ];
        if let Some(start) = start_date {
            params.push(("start_date", start.to_string()));
        }
        if let Some(end) = end_date {
            params.push(("end_date", end.to_string()));
        }
        self.get_json("/bars_daily", &params).await
    }

    async fn fetch_fundamentals_daily(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> anyhow::Result<Vec<FundamentalSnapshot>> {
        let params = vec![("symbol", symbol.to_string()), ("exchange", exchange.to_string())];
        self.get_json("/fundamentals_daily", &params).await
    }

    async fn fetch_capital_flow_daily(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> anyhow::Result<Vec<CapitalFlowDaily>> {
        let params = vec![("symbol", symbol.to_string()), ("exchange", exchange.to_string())];
        self.get_json("/capital_flow_daily", &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_provider_reports_unhealthy() {
        let provider = HttpProvider::new(None, None);
        assert!(!provider.status().await.ok);
    }

    #[tokio::test]
    async fn unconfigured_provider_errors_on_fetch() {
        let provider = HttpProvider::new(None, None);
        let result = provider.iter_instruments().await;
        assert!(result.is_err());
    }
}
