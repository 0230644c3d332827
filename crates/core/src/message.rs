//! Turn and Conversation domain types.
//!
//! A conversation is the full context replayed to the reasoning capability
//! on every step: the user's question, each assistant reply, and every tool
//! observation, in the order they happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::ToolObservation;

/// Unique identifier for a conversation (one query run).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request from the reasoning capability to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Call ID assigned by the reasoning capability (matches the wire tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub tool_name: String,

    /// Arguments as a JSON value (expected to be an object)
    pub arguments: serde_json::Value,
}

impl ToolRequest {
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// What the reasoning capability said on one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantMessage {
    /// Plain text: the loop is done.
    FinalAnswer { text: String },

    /// Not done yet: run these tools and resume.
    ToolRequests {
        /// Any text the model emitted alongside its tool calls
        #[serde(default, skip_serializing_if = "String::is_empty")]
        thought: String,
        requests: Vec<ToolRequest>,
    },
}

impl AssistantMessage {
    /// Build from a raw model reply. An empty request list means the reply
    /// is a final answer, so `ToolRequests` is never empty.
    pub fn from_parts(text: String, requests: Vec<ToolRequest>) -> Self {
        if requests.is_empty() {
            Self::FinalAnswer { text }
        } else {
            Self::ToolRequests {
                thought: text,
                requests,
            }
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. })
    }
}

/// One unit of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User { text: String },
    Assistant(AssistantMessage),
    Observation(ToolObservation),
}

/// An append-only sequence of turns owned by a single query run.
///
/// There is deliberately no way to edit or remove a turn once pushed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    turns: Vec<Turn>,
    created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Create a conversation seeded with the user's question.
    pub fn with_user_message(text: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.push(Turn::User { text: text.into() });
        conv
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn extend_observations(&mut self, observations: impl IntoIterator<Item = ToolObservation>) {
        self.turns
            .extend(observations.into_iter().map(Turn::Observation));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// All tool observations so far, in order.
    pub fn observations(&self) -> impl Iterator<Item = &ToolObservation> {
        self.turns.iter().filter_map(|t| match t {
            Turn::Observation(obs) => Some(obs),
            _ => None,
        })
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
