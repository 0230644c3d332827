//! The statsagent orchestration loop.
//!
//! A query follows a **Reason → Execute → Observe** cycle:
//!
//! 1. **Seed** a conversation with the user's question
//! 2. **Reason**: send the conversation and declared tools to the provider
//! 3. **If tool requests**: execute them, append one observation per
//!    request, loop back to step 2
//! 4. **If text**: that is the final answer
//!
//! The loop ends with an answer, or aborts when the iteration bound is hit,
//! the provider fails, or the caller cancels.

pub mod execution;
pub mod orchestrator;
pub mod prompt;
pub mod reasoning;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use execution::{ExecutionStep, TimedObservation};
pub use orchestrator::{Answer, Orchestrator, RunPhase, RunState};
pub use reasoning::ReasoningStep;
pub use tokio_util::sync::CancellationToken;
