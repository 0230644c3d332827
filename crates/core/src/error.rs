//! Error types for the statsagent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; only the top-level
//! [`Error`] ever leaves the orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for a query run.
///
/// Tool-level failures never appear here: they are folded into the
/// conversation as observations. What remains is the set of reasons a
/// query can be aborted.
#[derive(Debug, Error)]
pub enum Error {
    /// The reasoning capability could not produce a reply.
    #[error("Reasoning unavailable: {0}")]
    ReasoningUnavailable(#[from] ProviderError),

    /// The iteration bound was hit before a final answer was produced.
    #[error("Recursion limit of {max_iterations} reasoning steps reached without a final answer")]
    RecursionExceeded { max_iterations: u32 },

    /// The caller cancelled the query between two suspension points.
    #[error("Query cancelled")]
    Cancelled,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Failures of the statistical data service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataServiceError {
    /// Rejected before any network call.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Connection refused, timeout or overloaded upstream.
    #[error("Data service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The identifier did not resolve to any data.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The service answered with something we could not interpret.
    #[error("Data service error: {0}")]
    ServiceError(String),
}

impl DataServiceError {
    /// Only transient connectivity failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error(transparent)]
    DataService(#[from] DataServiceError),
}

/// The failure classes an observation can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidArgument,
    ServiceUnavailable,
    NotFound,
    ServiceError,
    UnknownTool,
    Timeout,
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            Self::UnknownTool(_) => ToolErrorKind::UnknownTool,
            Self::InvalidArguments(_) => ToolErrorKind::InvalidArgument,
            Self::Timeout { .. } => ToolErrorKind::Timeout,
            Self::DataService(e) => match e {
                DataServiceError::InvalidArgument(_) => ToolErrorKind::InvalidArgument,
                DataServiceError::ServiceUnavailable(_) => ToolErrorKind::ServiceUnavailable,
                DataServiceError::NotFound(_) => ToolErrorKind::NotFound,
                DataServiceError::ServiceError(_) => ToolErrorKind::ServiceError,
            },
        }
    }
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidArgument => "invalid_argument",
            Self::ServiceUnavailable => "service_unavailable",
            Self::NotFound => "not_found",
            Self::ServiceError => "service_error",
            Self::UnknownTool => "unknown_tool",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}
