use serde_json::{json, Value};
use thiserror::Error;

/// Errors emitted by the agent-core crate.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Raised when a turn request is malformed or missing required fields.
    #[error("invalid chat request: {0}")]
    InvalidRequest(String),
}

impl AgentError {
    /// Helper for wrapping static string errors.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

/// Failure of a single tool call. Never aborts a turn; it is handed back to
/// the model as a structured tool response.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("tool '{0}' is not available in ask mode")]
    NotPermitted(String),

    #[error("page write failed: {0}")]
    WriteFailed(String),
}

impl ToolError {
    pub fn invalid_arguments(tool: &str, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    /// Response body fed back into the conversation.
    pub fn to_response(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}
