//! Reasoning-capability providers for statsagent.
//!
//! All providers implement the `statsagent_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use statsagent_config::AppConfig;
use statsagent_core::Provider;
use statsagent_core::error::ProviderError;
use std::sync::Arc;

/// Build the provider named in the configuration.
///
/// Every supported backend speaks the OpenAI chat-completions dialect; they
/// differ only in base URL and whether a key is required.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.provider.name.as_str();
    let timeout = config.agent.reasoning_timeout();

    let api_key = match (&config.api_key, name) {
        (Some(key), _) => key.clone(),
        (None, "ollama") => "ollama".to_string(),
        (None, _) => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{name}' (set STATSAGENT_API_KEY or OPENAI_API_KEY)"
            )));
        }
    };

    tracing::debug!(provider = name, base_url = %config.provider.base_url, "Provider configured");

    Ok(Arc::new(OpenAiCompatProvider::new(
        name,
        config.provider.base_url.clone(),
        api_key,
        timeout,
    )?))
}
