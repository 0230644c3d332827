//! The reasoning step: one call to the reasoning capability.

use statsagent_core::error::{Error, ProviderError};
use statsagent_core::message::Conversation;
use statsagent_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Sends the whole conversation plus the declared tools to the provider.
///
/// Exactly one `complete` call per invocation; failures are not retried.
pub struct ReasoningStep {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
    tools: Vec<ToolDefinition>,
    timeout: Duration,
}

impl ReasoningStep {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            system_prompt: None,
            tools,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the provider what to do next.
    pub async fn reason(&self, conversation: &Conversation) -> Result<ProviderResponse, Error> {
        let request = ProviderRequest {
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            turns: conversation.turns().to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.clone(),
        };

        debug!(
            conversation_id = %conversation.id(),
            provider = self.provider.name(),
            turns = request.turns.len(),
            "Requesting reasoning step"
        );

        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(result) => result.map_err(Error::ReasoningUnavailable),
            Err(_) => Err(Error::ReasoningUnavailable(ProviderError::Timeout(format!(
                "no reply from {} within {}s",
                self.provider.name(),
                self.timeout.as_secs()
            )))),
        }
    }
}
