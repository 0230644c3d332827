//! Bounded retry with exponential backoff for transient data-service failures.
//!
//! Only [`DataServiceError::ServiceUnavailable`] is retried; not-found and
//! malformed responses are returned immediately.

use async_trait::async_trait;
use statsagent_config::RetryConfig;
use statsagent_core::data::{DataService, IndicatorMatch, ObservationRequest, ObservationSeries, SearchRequest};
use statsagent_core::error::DataServiceError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    pub initial_delay: Duration,

    pub max_delay: Duration,

    /// Backoff multiplier (exponential growth)
    pub multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
        }
    }

    /// Delay before retry number `retry` (0-indexed):
    /// `min(initial * multiplier^retry, max)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64 * (self.multiplier as f64).powi(retry as i32);
        let capped = base.min(self.max_delay.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, DataServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DataServiceError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt - 1);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Data service unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Wraps any [`DataService`] with a [`RetryPolicy`].
pub struct RetryingDataService {
    inner: Arc<dyn DataService>,
    policy: RetryPolicy,
}

impl RetryingDataService {
    pub fn new(inner: Arc<dyn DataService>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl DataService for RetryingDataService {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<IndicatorMatch>, DataServiceError> {
        self.policy.run("search", || self.inner.search(request)).await
    }

    async fn observe(&self, request: &ObservationRequest) -> Result<ObservationSeries, DataServiceError> {
        self.policy.run("observe", || self.inner.observe(request)).await
    }

    async fn health_check(&self) -> Result<bool, DataServiceError> {
        self.inner.health_check().await
    }
}
