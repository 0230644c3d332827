//! Tool trait: the abstraction over data-retrieval capabilities.
//!
//! Tools are what the reasoning capability may ask the system to run:
//! searching for indicators, fetching observations, and so on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ToolError, ToolErrorKind};
use crate::message::ToolRequest;
use crate::provider::ToolDefinition;
use crate::schema;

/// The successful result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Text handed back to the reasoning capability
    pub output: String,

    /// Structured payload (indicator matches, observation series, ...)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl ToolResult {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            data: serde_json::Value::Null,
        }
    }

    /// Wrap a structured payload; the output is its pretty-printed JSON.
    pub fn json(data: serde_json::Value) -> Self {
        let output = serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string());
        Self { output, data }
    }
}

/// How a tool call ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(ToolResult),
    Failure { kind: ToolErrorKind, message: String },
}

/// A tool call and its outcome, as recorded in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolObservation {
    /// The call ID this observation answers
    pub call_id: String,

    pub tool_name: String,

    pub arguments: serde_json::Value,

    pub outcome: ToolOutcome,
}

impl ToolObservation {
    /// Record the result of running `request`, success or not.
    pub fn from_result(request: &ToolRequest, result: Result<ToolResult, ToolError>) -> Self {
        let outcome = match result {
            Ok(r) => ToolOutcome::Success(r),
            Err(e) => ToolOutcome::Failure {
                kind: e.kind(),
                message: e.to_string(),
            },
        };
        Self {
            call_id: request.id.clone(),
            tool_name: request.tool_name.clone(),
            arguments: request.arguments.clone(),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match &self.outcome {
            ToolOutcome::Failure { kind, .. } => Some(*kind),
            ToolOutcome::Success(_) => None,
        }
    }

    /// The content sent back to the reasoning capability for this call.
    ///
    /// Failures are rendered as a small JSON error record so the model can
    /// tell them apart from data and pick another strategy.
    pub fn model_content(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success(r) => r.output.clone(),
            ToolOutcome::Failure { kind, message } => serde_json::json!({
                "error": kind,
                "message": message,
            })
            .to_string(),
        }
    }
}

/// The core Tool trait.
///
/// Each data-retrieval operation implements this trait and is registered
/// in the [`ToolRegistry`] at startup.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search_indicators").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A fixed table of tools, keyed by name.
///
/// Built once at startup and shared behind an `Arc`. The agent uses it to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up, validate and execute tools when the LLM requests them
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool request: lookup, schema validation, then the call.
    pub async fn execute(&self, request: &ToolRequest) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&request.tool_name)
            .ok_or_else(|| ToolError::UnknownTool(request.tool_name.clone()))?;

        schema::validate_arguments(&tool.parameters_schema(), &request.arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        tool.execute(request.arguments.clone()).await
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
