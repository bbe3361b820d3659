//! Ordered provider registry implementing first-healthy fallback.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::models::{CapitalFlowDaily, FundamentalSnapshot};
use crate::domain::ports::{BarDailyRow, DataProvider, InstrumentRow};
use crate::domain::types::{Adj, Exchange};

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn DataProvider>>,
    order: Vec<String>,
}

impl ProviderRegistry {
    pub fn new(order: Vec<String>) -> Self {
        Self {
            providers: HashMap::new(),
            order,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn DataProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Configured order first, then any registered provider not named there.
    fn ordered(&self) -> Vec<&Arc<dyn DataProvider>> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for name in &self.order {
            if let Some(provider) = self.providers.get(name) {
                result.push(provider);
                seen.insert(name.clone());
            }
        }
        for (name, provider) in &self.providers {
            if !seen.contains(name) {
                result.push(provider);
            }
        }
        result
    }

    pub async fn statuses(&self) -> Vec<(String, bool)> {
        let mut out = Vec::new();
        for provider in self.ordered() {
            out.push((provider.name().to_string(), provider.status().await.ok));
        }
        out
    }

    pub async fn iter_instruments(&self) -> anyhow::Result<Vec<InstrumentRow>> {
        let mut last_err: Option<anyhow::Error> = None;
        for provider in self.ordered() {
            if !provider.status().await.ok {
                continue;
            }
            match provider.iter_instruments().await {
                Ok(rows) => return Ok(rows),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "provider failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no healthy provider available")))
    }

    pub async fn fetch_bars_daily(
        &self,
        symbol: &str,
        exchange: Exchange,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        adj: Adj,
    ) -> anyhow::Result<Vec<BarDailyRow>> {
        let mut last_err: Option<anyhow::Error> = None;
        for provider in self.ordered() {
            if !provider.status().await.ok {
                continue;
            }
            match provider
                .fetch_bars_daily(symbol, exchange, start_date, end_date, adj)
                .await
            {
                Ok(rows) => return Ok(rows),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "provider failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no healthy provider available")))
    }

    pub async fn fetch_fundamentals_daily(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> anyhow::Result<Vec<FundamentalSnapshot>> {
        let mut last_err: Option<anyhow::Error> = None;
        for provider in self.ordered() {
            if !provider.status().await.ok {
                continue;
            }
            match provider.fetch_fundamentals_daily(symbol, exchange).await {
                Ok(rows) => return Ok(rows),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "provider failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no healthy provider available")))
    }

    pub async fn fetch_capital_flow_daily(
        &self,
        symbol: &str,
        exchange: Exchange,
    ) -> anyhow::Result<Vec<CapitalFlowDaily>> {
        let mut last_err: Option<anyhow::Error> = None;
        for provider in self.ordered() {
            if !provider.status().await.ok {
                continue;
            }
            match provider.fetch_capital_flow_daily(symbol, exchange).await {
                Ok(rows) => return Ok(rows),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "provider failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no healthy provider available")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::providers::LocalProvider;

    #[tokio::test]
    async fn falls_back_when_preferred_provider_is_missing() {
        let mut registry = ProviderRegistry::new(vec!["http".to_string(), "local".to_string()]);
        registry.register(Arc::new(LocalProvider::new()));

        let instruments = registry.iter_instruments().await.expect("local provider answers");
        assert!(!instruments.is_empty());
    }

    #[tokio::test]
    async fn reports_status_for_each_registered_provider() {
        let mut registry = ProviderRegistry::new(vec!["local".to_string()]);
        registry.register(Arc::new(LocalProvider::new()));

        let statuses = registry.statuses().await;
        assert_eq!(statuses, vec![("local".to_string(), true)]);
    }
}
