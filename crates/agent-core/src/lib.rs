//! Agent orchestrator for page chat.
//!
//! Ties the snapshot store and the inference client together: each chat turn
//! ingests the active tab, describes it to the model, and runs tool-calling
//! rounds until the model answers, the round limit is hit, or the caller
//! cancels.

pub mod agent_loop;
pub mod errors;
pub mod ports;
pub mod tools;

pub use agent_loop::{
    AgentLoopConfig, ChatEvent, ChatMode, ChatSession, PageIdentity, PageView, TurnOutcome,
    TurnStatus, DEFAULT_ROUND_LIMIT_MARKER, DEFAULT_STOPPED_MARKER,
};
pub use errors::{AgentError, ToolError};
pub use ports::{NoPageWriter, PageContent, PageExtractor, PageWriter, WriteRequest, WriteResult};
pub use tools::{ToolContext, ToolInvocation};
