//! Configuration loading, validation, and management for statsagent.
//!
//! Loads configuration from `~/.statsagent/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.statsagent/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the reasoning provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for reasoning
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per reasoning reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Reasoning provider endpoint
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Statistical data service endpoint and retry policy
    #[serde(default)]
    pub data_service: DataServiceConfig,

    /// Orchestration limits
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("provider", &self.provider)
            .field("data_service", &self.data_service)
            .field("agent", &self.agent)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// OpenAI-compatible base URL (without `/chat/completions`)
    #[serde(default = "default_provider_url")]
    pub base_url: String,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_provider_url() -> String {
    "https://api.openai.com/v1".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_provider_url(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DataServiceConfig {
    /// MCP endpoint of the statistical data service
    #[serde(default = "default_data_service_url")]
    pub url: String,

    /// Optional key forwarded as a bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request HTTP timeout
    #[serde(default = "default_data_service_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_data_service_url() -> String {
    "http://localhost:8889/mcp".into()
}
fn default_data_service_timeout() -> u64 {
    10
}

impl std::fmt::Debug for DataServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataServiceConfig")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Default for DataServiceConfig {
    fn default() -> Self {
        Self {
            url: default_data_service_url(),
            api_key: None,
            timeout_secs: default_data_service_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

impl DataServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Worst-case time for one call: every attempt times out and every
    /// backoff is waited in full.
    pub fn retry_budget(&self) -> Duration {
        let retry = &self.retry;
        let attempts = retry.max_attempts.max(1);
        let backoff_ms: f64 = (0..attempts - 1)
            .map(|n| {
                (retry.initial_delay_ms as f64 * (retry.multiplier as f64).powi(n as i32))
                    .min(retry.max_delay_ms as f64)
            })
            .sum();
        self.timeout() * attempts + Duration::from_millis(backoff_ms.ceil() as u64)
    }
}

/// Backoff for transient data-service failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f32,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    200
}
fn default_max_delay_ms() -> u64 {
    5000
}
fn default_multiplier() -> f32 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on reasoning steps per query
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Wall-clock limit for one reasoning call
    #[serde(default = "default_reasoning_timeout")]
    pub reasoning_timeout_secs: u64,

    /// Wall-clock limit for one tool call (retries included)
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Run the tool requests of one step concurrently
    #[serde(default)]
    pub concurrent_tools: bool,

    /// Also offer the one-step `fetch_statistical_data` tool
    #[serde(default)]
    pub enable_fetch_tool: bool,

    /// Replace the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Print the tool-call trace after each answer
    #[serde(default = "default_true")]
    pub show_trace: bool,
}

fn default_max_iterations() -> u32 {
    25
}
fn default_reasoning_timeout() -> u64 {
    120
}
fn default_tool_timeout() -> u64 {
    45
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            reasoning_timeout_secs: default_reasoning_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            concurrent_tools: false,
            enable_fetch_tool: false,
            system_prompt_override: None,
            show_trace: true,
        }
    }
}

impl AgentConfig {
    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_secs(self.reasoning_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.statsagent/config.toml).
    ///
    /// Environment overrides:
    /// - `STATSAGENT_API_KEY`, then `OPENAI_API_KEY` (only if no key in the file)
    /// - `STATSAGENT_MODEL`
    /// - `STATSAGENT_MCP_URL`
    /// - `STATSAGENT_MAX_ITERATIONS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("STATSAGENT_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(model) = lookup("STATSAGENT_MODEL") {
            self.model = model;
        }

        if let Some(url) = lookup("STATSAGENT_MCP_URL") {
            self.data_service.url = url;
        }

        if let Some(raw) = lookup("STATSAGENT_MAX_ITERATIONS") {
            self.agent.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "STATSAGENT_MAX_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".statsagent")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.reasoning_timeout_secs == 0 || self.agent.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent timeouts must be greater than zero".into(),
            ));
        }

        if self.data_service.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "data_service.timeout_secs must be greater than zero".into(),
            ));
        }

        if self.data_service.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "data_service.retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.data_service.retry.multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "data_service.retry.multiplier must be >= 1.0".into(),
            ));
        }

        let budget = self.data_service.retry_budget();
        if self.agent.tool_timeout() < budget {
            return Err(ConfigError::ValidationError(format!(
                "agent.tool_timeout_secs ({}) is shorter than the data service retry budget \
                 ({:.1}s = {} attempts x {}s plus backoff); raise it or lower data_service.timeout_secs",
                self.agent.tool_timeout_secs,
                budget.as_secs_f64(),
                self.data_service.retry.max_attempts,
                self.data_service.timeout_secs
            )));
        }

        if !self.data_service.url.starts_with("http://") && !self.data_service.url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "data_service.url must start with http:// or https://, got '{}'",
                self.data_service.url
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            provider: ProviderConfig::default(),
            data_service: DataServiceConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
