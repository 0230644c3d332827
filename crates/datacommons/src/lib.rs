//! Statistical data-service implementations for statsagent.
//!
//! - [`McpDataClient`]: the Data Commons MCP server over JSON-RPC/HTTP
//! - [`RetryingDataService`]: bounded backoff around any service
//! - [`InMemoryDataService`]: a fixed sample dataset for offline use and tests

pub mod fixture;
pub mod mcp;
pub mod retry;
mod wire;

pub use fixture::{DataCall, InMemoryDataService};
pub use mcp::McpDataClient;
pub use retry::{RetryPolicy, RetryingDataService};

use statsagent_config::DataServiceConfig;
use statsagent_core::data::DataService;
use statsagent_core::error::DataServiceError;
use std::sync::Arc;

/// Build the configured MCP client wrapped in its retry policy.
pub fn from_config(config: &DataServiceConfig) -> Result<Arc<dyn DataService>, DataServiceError> {
    let client = McpDataClient::from_config(config)?;
    tracing::debug!(url = %client.endpoint(), "Data service configured");
    Ok(Arc::new(RetryingDataService::new(
        Arc::new(client),
        RetryPolicy::from_config(&config.retry),
    )))
}
