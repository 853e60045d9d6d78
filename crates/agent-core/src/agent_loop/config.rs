//! Configuration for the chat turn loop.

use pagelens_inference::GenerationParams;
use serde::{Deserialize, Serialize};

use super::types::ChatMode;

pub const DEFAULT_STOPPED_MARKER: &str = "\n\n[Stopped by user]";
pub const DEFAULT_ROUND_LIMIT_MARKER: &str = "\n\n[Stopped after reaching the tool round limit]";

/// Configuration for one chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLoopConfig {
    /// Model name sent with every inference request.
    /// Default: "gemini-3-pro-preview"
    pub model: String,

    /// Maximum model rounds per turn. A round that still asks for tools
    /// once the limit is reached ends the turn as done.
    /// Default: 10
    pub max_rounds: u32,

    /// Ask (read-only) or agent (may write editors).
    /// Default: ask
    pub mode: ChatMode,

    /// Extra instructions appended after the base system prompt.
    pub persona: Option<String>,

    /// Appended to the streamed text when the caller cancels a turn.
    /// Default: "\n\n[Stopped by user]"
    pub stopped_marker: String,

    /// Closes the model turn when the round limit cuts off pending tool
    /// calls, so the transcript still ends on a model reply.
    /// Default: "\n\n[Stopped after reaching the tool round limit]"
    pub round_limit_marker: String,

    /// Token limits, temperature and thinking flags for each round.
    pub generation: GenerationParams,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            model: "gemini-3-pro-preview".to_string(),
            max_rounds: 10,
            mode: ChatMode::Ask,
            persona: None,
            stopped_marker: DEFAULT_STOPPED_MARKER.to_string(),
            round_limit_marker: DEFAULT_ROUND_LIMIT_MARKER.to_string(),
            generation: GenerationParams::default(),
        }
    }
}

impl AgentLoopConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the round limit. Zero is raised to one.
    pub fn max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds.max(1);
        self
    }

    pub fn mode(mut self, mode: ChatMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn generation(mut self, params: GenerationParams) -> Self {
        self.generation = params;
        self
    }

    /// Effective round limit, never below one.
    pub fn round_limit(&self) -> u32 {
        self.max_rounds.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentLoopConfig::default();
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.mode, ChatMode::Ask);
        assert_eq!(config.stopped_marker, DEFAULT_STOPPED_MARKER);
        assert_eq!(config.round_limit_marker, DEFAULT_ROUND_LIMIT_MARKER);
        assert!(config.persona.is_none());
    }

    #[test]
    fn test_builder() {
        let config = AgentLoopConfig::new()
            .model("gemini-2.5-flash")
            .max_rounds(0)
            .mode(ChatMode::Agent)
            .persona("Answer in French.");
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.max_rounds, 1);
        assert!(config.mode.allows_writes());
        assert_eq!(config.persona.as_deref(), Some("Answer in French."));
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: AgentLoopConfig = serde_json::from_str(r#"{"max_rounds": 4, "mode": "agent"}"#).unwrap();
        assert_eq!(config.max_rounds, 4);
        assert_eq!(config.mode, ChatMode::Agent);
        assert_eq!(config.stopped_marker, DEFAULT_STOPPED_MARKER);
    }
}
