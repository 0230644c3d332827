//! Shared test helpers for agent tests.

use statsagent_core::error::ProviderError;
use statsagent_core::message::{AssistantMessage, ToolRequest};
use statsagent_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::Mutex;
use std::time::Duration;

/// A scripted provider: each call to `complete` returns the next reply.
///
/// Every request is recorded so tests can inspect what the model saw.
/// Panics if more calls are made than replies provided.
pub struct SequentialMockProvider {
    replies: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl SequentialMockProvider {
    pub fn new(replies: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn replies(replies: Vec<ProviderResponse>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    /// Sleep this long before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            panic!("SequentialMockProvider: no more replies (call #{call})");
        }
        replies.remove(0)
    }
}

/// A final-answer reply.
pub fn text_reply(text: &str) -> ProviderResponse {
    reply(AssistantMessage::FinalAnswer { text: text.into() })
}

/// A reply requesting the given tool calls.
pub fn tool_reply(requests: Vec<ToolRequest>) -> ProviderResponse {
    reply(AssistantMessage::from_parts(String::new(), requests))
}

/// A tool request with a call id derived from `n`.
pub fn call(n: usize, name: &str, args: serde_json::Value) -> ToolRequest {
    ToolRequest::new(format!("call_{n}"), name, args)
}

fn reply(message: AssistantMessage) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}
