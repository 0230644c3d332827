//! The orchestrator: drives one query from question to answer.
//!
//! ```text
//! AwaitingReasoning ──final answer──▶ Done
//!        │    ▲
//!  tool  │    │ observations appended
//! calls  ▼    │
//!       Executing
//!
//! AwaitingReasoning ──bound hit / provider failure / cancel──▶ Aborted
//! Executing ──bound hit / cancel──▶ Aborted
//! ```
//!
//! Before every reasoning call the iteration bound is checked; a query
//! that has already used `max_iterations` reasoning calls is aborted.
//! Tool requests returned by the last allowed reasoning call are not
//! executed.

use chrono::Utc;
use statsagent_config::AppConfig;
use statsagent_core::error::{Error, Result};
use statsagent_core::event::{DomainEvent, EventBus};
use statsagent_core::message::{AssistantMessage, Conversation, Turn};
use statsagent_core::provider::{Provider, ProviderResponse};
use statsagent_core::tool::{ToolObservation, ToolRegistry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::execution::{ExecutionStep, TimedObservation};
use crate::prompt;
use crate::reasoning::ReasoningStep;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    AwaitingReasoning,
    Executing,
    Done,
    Aborted,
}

/// Per-query state, owned by a single run.
#[derive(Debug)]
pub struct RunState {
    pub conversation: Conversation,
    pub iteration_count: u32,
    pub max_iterations: u32,
    pub phase: RunPhase,
}

impl RunState {
    fn new(query: &str, max_iterations: u32) -> Self {
        Self {
            conversation: Conversation::with_user_message(query),
            iteration_count: 0,
            max_iterations,
            phase: RunPhase::AwaitingReasoning,
        }
    }
}

/// The result of a successful query.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The final natural-language answer
    pub text: String,

    /// Every tool call made, in order, with its outcome
    pub trace: Vec<ToolObservation>,

    /// Reasoning calls used
    pub iterations: u32,
}

/// Runs the reasoning/execution loop for each query.
///
/// Holds only shared, immutable collaborators, so one orchestrator can
/// serve many concurrent queries.
pub struct Orchestrator {
    reasoning: ReasoningStep,
    execution: ExecutionStep,
    max_iterations: u32,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(reasoning: ReasoningStep, execution: ExecutionStep) -> Self {
        Self {
            reasoning,
            execution,
            max_iterations: 25,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Wire up an orchestrator from configuration.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>, registry: Arc<ToolRegistry>) -> Self {
        let agent = &config.agent;

        let reasoning = ReasoningStep::new(provider, config.model.clone(), registry.definitions())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_system_prompt(prompt::system_prompt(agent.system_prompt_override.as_deref()))
            .with_timeout(agent.reasoning_timeout());

        let execution = ExecutionStep::new(registry)
            .with_tool_timeout(agent.tool_timeout())
            .with_concurrency(agent.concurrent_tools);

        Self::new(reasoning, execution).with_max_iterations(agent.max_iterations)
    }

    /// Set the maximum number of reasoning calls per query.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Answer a question with the configured iteration bound.
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        self.answer_with(query, self.max_iterations, &CancellationToken::new()).await
    }

    pub async fn answer_with_limit(&self, query: &str, max_iterations: u32) -> Result<Answer> {
        self.answer_with(query, max_iterations, &CancellationToken::new()).await
    }

    /// Answer a question, giving up with [`Error::Cancelled`] once `cancel`
    /// fires. The in-flight reasoning or tool call is dropped.
    pub async fn answer_with_cancel(&self, query: &str, cancel: CancellationToken) -> Result<Answer> {
        self.answer_with(query, self.max_iterations, &cancel).await
    }

    /// Answer a question with an explicit bound and cancellation token.
    pub async fn answer_with(&self, query: &str, max_iterations: u32, cancel: &CancellationToken) -> Result<Answer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("question must not be empty".into()));
        }

        let mut state = RunState::new(query, max_iterations);
        let conversation_id = state.conversation.id().to_string();

        info!(conversation_id = %conversation_id, max_iterations, "Answering query");
        self.event_bus.publish(DomainEvent::QueryStarted {
            conversation_id: conversation_id.clone(),
            query_preview: query.chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        let result = self.drive(&mut state, cancel).await;

        match &result {
            Ok(answer) => info!(
                conversation_id = %conversation_id,
                iterations = answer.iterations,
                tool_calls = answer.trace.len(),
                elapsed_ms = (Utc::now() - state.conversation.created_at()).num_milliseconds(),
                "Query answered"
            ),
            Err(e) => warn!(
                conversation_id = %conversation_id,
                iterations = state.iteration_count,
                error = %e,
                "Query aborted"
            ),
        }

        self.event_bus.publish(DomainEvent::QueryFinished {
            conversation_id,
            iterations: state.iteration_count,
            abort_reason: result.as_ref().err().map(|e| e.to_string()),
            timestamp: Utc::now(),
        });

        result
    }

    async fn drive(&self, state: &mut RunState, cancel: &CancellationToken) -> Result<Answer> {
        loop {
            debug_assert_eq!(state.phase, RunPhase::AwaitingReasoning);

            if state.iteration_count >= state.max_iterations {
                state.phase = RunPhase::Aborted;
                return Err(Error::RecursionExceeded {
                    max_iterations: state.max_iterations,
                });
            }
            state.iteration_count += 1;

            debug!(
                conversation_id = %state.conversation.id(),
                iteration = state.iteration_count,
                "Reasoning"
            );

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                r = self.reasoning.reason(&state.conversation) => r,
            };
            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    state.phase = RunPhase::Aborted;
                    return Err(e);
                }
            };
            self.publish_reasoning(state, &response);

            match response.message {
                AssistantMessage::FinalAnswer { text } => {
                    state.conversation.push(Turn::Assistant(AssistantMessage::FinalAnswer { text: text.clone() }));
                    state.phase = RunPhase::Done;
                    return Ok(Answer {
                        text,
                        trace: state.conversation.observations().cloned().collect(),
                        iterations: state.iteration_count,
                    });
                }
                AssistantMessage::ToolRequests { thought, requests } => {
                    state.phase = RunPhase::Executing;
                    state.conversation.push(Turn::Assistant(AssistantMessage::ToolRequests {
                        thought,
                        requests: requests.clone(),
                    }));

                    if state.iteration_count >= state.max_iterations {
                        state.phase = RunPhase::Aborted;
                        return Err(Error::RecursionExceeded {
                            max_iterations: state.max_iterations,
                        });
                    }

                    let observations = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        o = self.execution.execute_timed(&requests) => Some(o),
                    };
                    let Some(observations) = observations else {
                        state.phase = RunPhase::Aborted;
                        return Err(Error::Cancelled);
                    };

                    self.publish_tools(state, &observations);
                    state
                        .conversation
                        .extend_observations(observations.into_iter().map(|t| t.observation));
                    state.phase = RunPhase::AwaitingReasoning;
                }
            }
        }
    }

    fn publish_reasoning(&self, state: &RunState, response: &ProviderResponse) {
        let tool_requests = match &response.message {
            AssistantMessage::ToolRequests { requests, .. } => requests.len(),
            AssistantMessage::FinalAnswer { .. } => 0,
        };
        self.event_bus.publish(DomainEvent::ReasoningCompleted {
            conversation_id: state.conversation.id().to_string(),
            iteration: state.iteration_count,
            model: response.model.clone(),
            tool_requests,
            tokens_used: response.usage.map(|u| u.total_tokens),
            timestamp: Utc::now(),
        });
    }

    fn publish_tools(&self, state: &RunState, observations: &[TimedObservation]) {
        for timed in observations {
            self.event_bus.publish(DomainEvent::ToolExecuted {
                conversation_id: state.conversation.id().to_string(),
                tool_name: timed.observation.tool_name.clone(),
                arguments: timed.observation.arguments.clone(),
                error_kind: timed.observation.error_kind(),
                duration_ms: timed.duration.as_millis() as u64,
                timestamp: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;
    use statsagent_core::error::{ProviderError, ToolErrorKind};
    use statsagent_datacommons::InMemoryDataService;
    use std::time::Duration;

    fn orchestrator(provider: Arc<SequentialMockProvider>) -> Orchestrator {
        orchestrator_with_service(provider).0
    }

    fn orchestrator_with_service(provider: Arc<SequentialMockProvider>) -> (Orchestrator, Arc<InMemoryDataService>) {
        let service = Arc::new(InMemoryDataService::sample());
        let registry = Arc::new(statsagent_tools::default_registry(service.clone()));
        let reasoning = ReasoningStep::new(provider, "mock-model", registry.definitions());
        (Orchestrator::new(reasoning, ExecutionStep::new(registry)), service)
    }

    fn search_india() -> serde_json::Value {
        json!({"query": "population", "places": ["India"]})
    }

    #[tokio::test]
    async fn direct_answer_uses_one_iteration() {
        let provider = Arc::new(SequentialMockProvider::replies(vec![text_reply("Hello!")]));
        let answer = orchestrator(provider.clone()).answer("Hi").await.unwrap();

        assert_eq!(answer.text, "Hello!");
        assert_eq!(answer.iterations, 1);
        assert!(answer.trace.is_empty());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn two_step_workflow() {
        let provider = Arc::new(SequentialMockProvider::replies(vec![
            tool_reply(vec![call(1, "search_indicators", search_india())]),
            tool_reply(vec![call(
                2,
                "get_observations",
                json!({"variable_dcid": "Count_Person", "place_dcid": "country/IND"}),
            )]),
            text_reply("India's population was 1,428,627,663 in 2023."),
        ]));

        let answer = orchestrator(provider.clone()).answer("Population of India?").await.unwrap();

        assert_eq!(answer.iterations, 3);
        assert_eq!(answer.trace.len(), 2);
        assert!(answer.trace.iter().all(|o| o.is_success()));
        assert_eq!(answer.trace[0].tool_name, "search_indicators");
        assert_eq!(answer.trace[1].tool_name, "get_observations");
    }

    #[tokio::test]
    async fn conversation_is_append_only() {
        let provider = Arc::new(SequentialMockProvider::replies(vec![
            tool_reply(vec![call(1, "search_indicators", search_india())]),
            tool_reply(vec![call(2, "search_indicators", json!({"query": "gdp"}))]),
            text_reply("done"),
        ]));
        orchestrator(provider.clone()).answer("q").await.unwrap();

        let requests = provider.requests();
        for pair in requests.windows(2) {
            let (earlier, later) = (&pair[0].turns, &pair[1].turns);
            assert!(later.len() > earlier.len());
            assert_eq!(&later[..earlier.len()], earlier.as_slice());
        }
        // user, assistant, observation, assistant, observation
        assert_eq!(requests[2].turns.len(), 5);
    }

    #[tokio::test]
    async fn tool_failure_does_not_abort() {
        let provider = Arc::new(SequentialMockProvider::replies(vec![
            tool_reply(vec![call(1, "get_observations", json!({"variable_dcid": "Count_Person"}))]),
            text_reply("I could not fetch that."),
        ]));
        let answer = orchestrator(provider).answer("q").await.unwrap();

        assert_eq!(answer.trace[0].error_kind(), Some(ToolErrorKind::InvalidArgument));
        assert_eq!(answer.text, "I could not fetch that.");
    }

    #[tokio::test]
    async fn bound_counts_reasoning_calls() {
        let looping: Vec<_> = (0..3)
            .map(|n| tool_reply(vec![call(n, "search_indicators", search_india())]))
            .collect();
        let provider = Arc::new(SequentialMockProvider::replies(looping));
        let (orchestrator, service) = orchestrator_with_service(provider.clone());

        let err = orchestrator.answer_with_limit("q", 3).await.unwrap_err();

        assert!(matches!(err, Error::RecursionExceeded { max_iterations: 3 }));
        assert_eq!(provider.call_count(), 3);
        // Requests from the last allowed reasoning call are not executed.
        assert_eq!(service.calls().len(), 2);
    }

    #[tokio::test]
    async fn answer_on_last_allowed_iteration_succeeds() {
        let provider = Arc::new(SequentialMockProvider::replies(vec![
            tool_reply(vec![call(1, "search_indicators", search_india())]),
            text_reply("ok"),
        ]));
        let answer = orchestrator(provider).answer_with_limit("q", 2).await.unwrap();
        assert_eq!(answer.iterations, 2);
    }

    #[tokio::test]
    async fn zero_bound_aborts_before_reasoning() {
        let provider = Arc::new(SequentialMockProvider::replies(vec![]));
        let err = orchestrator(provider.clone()).answer_with_limit("q", 0).await.unwrap_err();
        assert!(matches!(err, Error::RecursionExceeded { max_iterations: 0 }));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let provider = Arc::new(SequentialMockProvider::replies(vec![]));
        let err = orchestrator(provider).answer("   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn provider_failure_aborts() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(ProviderError::AuthenticationFailed(
            "bad key".into(),
        ))]));
        let err = orchestrator(provider).answer("q").await.unwrap_err();
        assert!(matches!(err, Error::ReasoningUnavailable(ProviderError::AuthenticationFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_reasoning() {
        let provider = Arc::new(
            SequentialMockProvider::replies(vec![text_reply("too late")]).with_delay(Duration::from_secs(60)),
        );
        let orchestrator = orchestrator(provider);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = orchestrator.answer_with_cancel("q", cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn events_follow_the_run() {
        let provider = Arc::new(SequentialMockProvider::replies(vec![
            tool_reply(vec![call(1, "search_indicators", search_india())]),
            text_reply("done"),
        ]));
        let orchestrator = orchestrator(provider);
        let mut rx = orchestrator.event_bus().subscribe();

        orchestrator.answer("q").await.unwrap();

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(match event.as_ref() {
                DomainEvent::QueryStarted { .. } => "started",
                DomainEvent::ReasoningCompleted { .. } => "reasoned",
                DomainEvent::ToolExecuted { .. } => "tool",
                DomainEvent::QueryFinished { abort_reason, .. } => {
                    assert!(abort_reason.is_none());
                    "finished"
                }
            });
        }
        assert_eq!(names, vec!["started", "reasoned", "tool", "reasoned", "finished"]);
    }

    #[tokio::test]
    async fn from_config_applies_agent_settings() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 7;
        let provider = Arc::new(SequentialMockProvider::replies(vec![text_reply("ok")]));
        let registry = Arc::new(statsagent_tools::default_registry(Arc::new(InMemoryDataService::sample())));

        let orchestrator = Orchestrator::from_config(&config, provider.clone(), registry);
        orchestrator.answer("q").await.unwrap();

        assert_eq!(orchestrator.max_iterations(), 7);
        let sent = &provider.requests()[0];
        assert_eq!(sent.model, "gpt-4o-mini");
        assert_eq!(sent.tools.len(), 2);
        assert!(sent.system_prompt.as_deref().unwrap().contains("search_indicators"));
    }
}
