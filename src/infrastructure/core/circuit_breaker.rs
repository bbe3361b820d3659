//! Circuit breaker guarding calls to an upstream market data provider.
//!
//! A provider that times out or 5xxs repeatedly gets tripped Open so the
//! registry's fallback chain (`domain::ports::DataProvider` impls tried in
//! `provider_order`) takes over immediately instead of every caller paying
//! the same timeout. `ProviderStatus::details` surfaces `last_error` so an
//! operator inspecting `/providers` can see why a provider went dark without
//! digging through logs.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,   // Provider is healthy, calls pass through
    Open,     // Failure threshold breached, calls are rejected without hitting the provider
    HalfOpen, // Probing whether the provider has recovered
}

/// Trips Open after consecutive provider failures, recovers through a
/// HalfOpen probe window once `timeout` has elapsed.
pub struct CircuitBreaker {
    state: Arc<RwLock<CircuitBreakerState>>,
    failure_threshold: usize,
    success_threshold: usize,
    timeout: Duration,
    provider_name: String,
}

struct CircuitBreakerState {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    last_failure_time: Option<Instant>,
    last_error: Option<String>,
}

impl CircuitBreaker {
    /// * `provider_name` - identifies the provider in logs and status output
    /// * `failure_threshold` - consecutive failures before the provider is cut off
    /// * `success_threshold` - consecutive HalfOpen successes needed to trust the provider again
    /// * `timeout` - how long to wait before probing a tripped provider
    pub fn new(
        provider_name: impl Into<String>,
        failure_threshold: usize,
        success_threshold: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(CircuitBreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
                last_error: None,
            })),
            failure_threshold,
            success_threshold,
            timeout,
            provider_name: provider_name.into(),
        }
    }

    /// Runs `f` if the provider isn't cut off, recording the outcome.
    pub async fn call<F, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        {
            let mut state = self.state.write().await;

            if state.state == CircuitState::Open {
                if let Some(last_failure) = state.last_failure_time {
                    if last_failure.elapsed() > self.timeout {
                        info!(
                            "provider [{}]: Open -> HalfOpen, probing for recovery",
                            self.provider_name
                        );
                        state.state = CircuitState::HalfOpen;
                        state.success_count = 0;
                    } else {
                        return Err(CircuitBreakerError::Open(format!(
                            "provider [{}] is cut off after repeated failures ({}); retry in {:?}",
                            self.provider_name,
                            state.last_error.as_deref().unwrap_or("unknown error"),
                            self.timeout - last_failure.elapsed()
                        )));
                    }
                }
            }
        }

        match f.await {
            Ok(result) => {
                self.on_success().await;
                Ok(result)
            }
            Err(e) => {
                let message = e.to_string();
                self.on_failure(message).await;
                Err(CircuitBreakerError::Inner(e))
            }
        }
    }

    async fn on_success(&self) {
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.success_threshold {
                    info!(
                        "provider [{}]: HalfOpen -> Closed ({} consecutive successes)",
                        self.provider_name, state.success_count
                    );
                    state.state = CircuitState::Closed;
                    state.failure_count = 0;
                    state.success_count = 0;
                    state.last_error = None;
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::Open => {
                warn!(
                    "provider [{}]: success recorded while cut off (unexpected)",
                    self.provider_name
                );
            }
        }
    }

    async fn on_failure(&self, error: String) {
        let mut state = self.state.write().await;

        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
        state.last_error = Some(error);

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.failure_threshold {
                    error!(
                        "provider [{}]: Closed -> Open ({} consecutive failures, last: {})",
                        self.provider_name,
                        state.failure_count,
                        state.last_error.as_deref().unwrap_or("unknown error")
                    );
                    state.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    "provider [{}]: HalfOpen -> Open, probe failed during recovery",
                    self.provider_name
                );
                state.state = CircuitState::Open;
                state.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.state.read().await.state
    }

    /// Message from the most recent failure, surfaced in provider status output.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }
}

/// Error type for circuit breaker
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("{0}")]
    Open(String),

    #[error(transparent)]
    Inner(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provider_is_cut_off_after_failures() {
        let cb = CircuitBreaker::new("test_provider", 3, 2, Duration::from_secs(1));

        for _ in 0..3 {
            let result = cb.call(async { Err::<(), &str>("upstream timed out") }).await;
            assert!(result.is_err());
        }

        assert_eq!(cb.state().await, CircuitState::Open);
        assert_eq!(cb.last_error().await, Some("upstream timed out".to_string()));

        let result = cb.call(async { Ok::<(), &str>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open(_))));
    }

    #[tokio::test]
    async fn provider_recovers_after_timeout() {
        let cb = CircuitBreaker::new("test_provider", 2, 2, Duration::from_millis(100));

        for _ in 0..2 {
            let _ = cb.call(async { Err::<(), &str>("connection refused") }).await;
        }

        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let result = cb.call(async { Ok::<(), &str>(()) }).await;
        assert!(result.is_ok());

        let result = cb.call(async { Ok::<(), &str>(()) }).await;
        assert!(result.is_ok());

        assert_eq!(cb.state().await, CircuitState::Closed);
        assert_eq!(cb.last_error().await, None);
    }

    #[tokio::test]
    async fn failed_probe_reopens_the_circuit() {
        let cb = CircuitBreaker::new("test_provider", 2, 2, Duration::from_millis(100));

        for _ in 0..2 {
            let _ = cb.call(async { Err::<(), &str>("503") }).await;
        }

        tokio::time::sleep(Duration::from_millis(150)).await;

        let _ = cb.call(async { Err::<(), &str>("503 again") }).await;

        assert_eq!(cb.state().await, CircuitState::Open);
        assert_eq!(cb.last_error().await, Some("503 again".to_string()));
    }
}
