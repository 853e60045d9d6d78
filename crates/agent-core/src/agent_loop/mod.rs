//! Chat turn loop.
//!
//! One [`ChatSession`] per chat connection. Each user message runs a turn of
//! bounded model rounds; tool calls requested by a round are executed against
//! the snapshot store and fed back before the next round.
//!
//! # Architecture
//!
//! ```text
//! prune_stale(); push(extract(tab))        // Preparing
//! for round in 1..=max_rounds:
//!     parts = stream(conversation)         // Streaming
//!     if no tool calls: flush usage; done
//!     conversation += model(parts)
//!     conversation += user(run_tools())    // ToolExecuting
//! ```
//!
//! # Key Components
//!
//! - [`AgentLoopConfig`]: Model, round limit, mode and persona
//! - [`ChatSession`]: Per-connection history and page identity
//! - [`ChatEvent`]: Caller-facing stream of deltas and completion

pub mod config;
pub mod controller;
pub mod prompt;
pub mod types;

pub use config::{AgentLoopConfig, DEFAULT_ROUND_LIMIT_MARKER, DEFAULT_STOPPED_MARKER};
pub use controller::{ChatSession, TurnOutcome};
pub use prompt::{
    format_page_section, format_page_switch, format_system_prompt, PageIdentity, PageView,
    BASE_SYSTEM_PROMPT,
};
pub use types::{ChatEvent, ChatMode, TurnStatus};
