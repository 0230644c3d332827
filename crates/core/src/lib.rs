//! # statsagent core
//!
//! Domain types, traits, and error definitions for the statsagent runtime,
//! which answers statistical questions by letting a language model call
//! data-retrieval tools.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here: the reasoning capability
//! ([`Provider`]), the statistical data service ([`DataService`]) and the
//! tools built on top of it ([`Tool`]). Implementations live in their own
//! crates, so tests can swap in scripted fakes.

pub mod data;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use data::{DataService, DateFilter, IndicatorMatch, Observation, ObservationRequest, ObservationSeries, SearchRequest};
pub use error::{DataServiceError, Error, ProviderError, Result, ToolError, ToolErrorKind};
pub use event::{DomainEvent, EventBus};
pub use message::{AssistantMessage, Conversation, ConversationId, ToolRequest, Turn};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolObservation, ToolOutcome, ToolRegistry, ToolResult};
