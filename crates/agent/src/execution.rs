//! The execution step: run the requested tools and record observations.

use futures::future::join_all;
use statsagent_core::error::ToolError;
use statsagent_core::message::ToolRequest;
use statsagent_core::tool::{ToolObservation, ToolRegistry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// An observation and how long its tool call took.
#[derive(Debug, Clone)]
pub struct TimedObservation {
    pub observation: ToolObservation,
    pub duration: Duration,
}

/// Runs tool requests against the registry.
///
/// Every request yields exactly one observation, in request order, whether
/// the call succeeded, failed or timed out.
pub struct ExecutionStep {
    registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
    concurrent: bool,
}

impl ExecutionStep {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            tool_timeout: Duration::from_secs(45),
            concurrent: false,
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Run independent requests concurrently instead of one by one.
    pub fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub async fn execute(&self, requests: &[ToolRequest]) -> Vec<ToolObservation> {
        self.execute_timed(requests)
            .await
            .into_iter()
            .map(|t| t.observation)
            .collect()
    }

    pub async fn execute_timed(&self, requests: &[ToolRequest]) -> Vec<TimedObservation> {
        if self.concurrent {
            join_all(requests.iter().map(|r| self.run_one(r))).await
        } else {
            let mut observations = Vec::with_capacity(requests.len());
            for request in requests {
                observations.push(self.run_one(request).await);
            }
            observations
        }
    }

    async fn run_one(&self, request: &ToolRequest) -> TimedObservation {
        let start = Instant::now();

        let result = match tokio::time::timeout(self.tool_timeout, self.registry.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool_name: request.tool_name.clone(),
                timeout_secs: self.tool_timeout.as_secs(),
            }),
        };

        let duration = start.elapsed();
        match &result {
            Ok(_) => debug!(
                tool = %request.tool_name,
                call_id = %request.id,
                duration_ms = duration.as_millis() as u64,
                "Tool call succeeded"
            ),
            Err(e) => warn!(
                tool = %request.tool_name,
                call_id = %request.id,
                kind = %e.kind(),
                error = %e,
                "Tool call failed"
            ),
        }

        TimedObservation {
            observation: ToolObservation::from_result(request, result),
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::call;
    use async_trait::async_trait;
    use serde_json::json;
    use statsagent_core::error::ToolErrorKind;
    use statsagent_core::tool::{Tool, ToolResult};

    /// Sleeps for `delay_ms` from its arguments, then echoes its label.
    struct SleepTool;

    #[async_trait]
    impl Tool for SleepTool {
        fn name(&self) -> &str {
            "sleep"
        }
        fn description(&self) -> &str {
            "Sleeps, then echoes"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({
                "type": "object",
                "properties": {
                    "label": {"type": "string"},
                    "delay_ms": {"type": "integer"}
                },
                "required": ["label", "delay_ms"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            let delay = arguments["delay_ms"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(ToolResult::text(arguments["label"].as_str().unwrap_or_default()))
        }
    }

    fn step() -> ExecutionStep {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(SleepTool));
        ExecutionStep::new(Arc::new(registry))
    }

    fn outputs(observations: &[ToolObservation]) -> Vec<String> {
        observations.iter().map(|o| o.model_content()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_keeps_request_order() {
        let requests = vec![
            call(1, "sleep", json!({"label": "a", "delay_ms": 300})),
            call(2, "sleep", json!({"label": "b", "delay_ms": 10})),
        ];
        let observations = step().execute(&requests).await;
        assert_eq!(outputs(&observations), vec!["a", "b"]);
        assert_eq!(observations[0].call_id, "call_1");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_keeps_request_order() {
        let requests = vec![
            call(1, "sleep", json!({"label": "slow", "delay_ms": 500})),
            call(2, "sleep", json!({"label": "fast", "delay_ms": 1})),
            call(3, "sleep", json!({"label": "mid", "delay_ms": 100})),
        ];
        let start = tokio::time::Instant::now();
        let observations = step().with_concurrency(true).execute(&requests).await;

        assert_eq!(outputs(&observations), vec!["slow", "fast", "mid"]);
        // Overlapped: bounded by the slowest call, not the sum.
        assert!(start.elapsed() < Duration::from_millis(601));
    }

    #[tokio::test]
    async fn failures_become_observations() {
        let requests = vec![
            call(1, "get_weather", json!({})),
            call(2, "sleep", json!({"label": "x"})),
            call(3, "sleep", json!({"label": "ok", "delay_ms": 0})),
        ];
        let observations = step().execute(&requests).await;

        assert_eq!(observations.len(), 3);
        assert_eq!(observations[0].error_kind(), Some(ToolErrorKind::UnknownTool));
        assert_eq!(observations[1].error_kind(), Some(ToolErrorKind::InvalidArgument));
        assert!(observations[2].is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let requests = vec![call(1, "sleep", json!({"label": "late", "delay_ms": 60_000}))];
        let observations = step()
            .with_tool_timeout(Duration::from_secs(2))
            .execute(&requests)
            .await;
        assert_eq!(observations[0].error_kind(), Some(ToolErrorKind::Timeout));
    }
}
