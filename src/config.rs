//! Application configuration.
//!
//! Loaded from YAML; every section and field falls back to its default, so a
//! config file only needs the keys it changes.

use std::collections::BTreeMap;

use agent_core::{AgentLoopConfig, ChatMode};
use pagelens_inference::{GenerationParams, ProviderProfile, RetryPolicy};
use pagelens_snapshot_store::{SnapPolicyView, MIN_SWEEP_INTERVAL_SEC};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown provider profile '{0}' (expected antigravity, gemini-cli, or a custom endpoint list)")]
    UnknownProfile(String),

    #[error("invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderSection,
    pub snapshot: SnapPolicyView,
    pub retry: RetryPolicy,
    pub agent: AgentSection,
}

/// Which backend to talk to and how to ask it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// Built-in profile name, or the name of a custom profile when
    /// `endpoints` is set.
    pub profile: String,
    /// Overrides the profile's endpoint list, tried in order.
    pub endpoints: Vec<String>,
    pub user_agent: Option<String>,
    /// Extra headers merged over the profile's own.
    pub headers: BTreeMap<String, String>,
    /// Used when `PAGELENS_PROJECT_ID` is unset.
    pub project_id: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub thinking: bool,
    pub thinking_budget: u32,
    /// Extra system instructions for every turn.
    pub persona: Option<String>,
}

impl Default for ProviderSection {
    fn default() -> Self {
        let loop_defaults = AgentLoopConfig::default();
        let generation = GenerationParams::default();
        Self {
            profile: "antigravity".to_string(),
            endpoints: Vec::new(),
            user_agent: None,
            headers: BTreeMap::new(),
            project_id: None,
            model: loop_defaults.model,
            max_tokens: generation.max_tokens,
            temperature: generation.temperature,
            thinking: generation.thinking,
            thinking_budget: generation.thinking_budget,
            persona: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_rounds: u32,
    pub mode: ChatMode,
    pub stopped_marker: String,
    pub round_limit_marker: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        let defaults = AgentLoopConfig::default();
        Self {
            max_rounds: defaults.max_rounds,
            mode: defaults.mode,
            stopped_marker: defaults.stopped_marker,
            round_limit_marker: defaults.round_limit_marker,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let snapshot = &self.snapshot;
        if !(0.0..=1.0).contains(&snapshot.small_diff_threshold) {
            return Err(ConfigError::invalid(
                "snapshot.small_diff_threshold",
                format!("{} is outside 0..=1", snapshot.small_diff_threshold),
            ));
        }
        if snapshot.chunk_size == 0 {
            return Err(ConfigError::invalid("snapshot.chunk_size", "must be positive"));
        }
        if snapshot.max_chunks == 0 {
            return Err(ConfigError::invalid("snapshot.max_chunks", "must be positive"));
        }
        if snapshot.sweep_interval_sec != 0 && snapshot.sweep_interval_sec < MIN_SWEEP_INTERVAL_SEC {
            return Err(ConfigError::invalid(
                "snapshot.sweep_interval_sec",
                format!("must be 0 (disabled) or at least {MIN_SWEEP_INTERVAL_SEC}"),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be positive"));
        }
        if self.agent.max_rounds == 0 {
            return Err(ConfigError::invalid("agent.max_rounds", "must be positive"));
        }
        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::invalid("provider.model", "must not be empty"));
        }
        Ok(())
    }

    /// Resolve the provider profile, applying endpoint and header overrides.
    pub fn provider_profile(&self) -> Result<ProviderProfile, ConfigError> {
        let provider = &self.provider;
        let mut profile = if provider.endpoints.is_empty() {
            ProviderProfile::builtin(&provider.profile)
                .map_err(|_| ConfigError::UnknownProfile(provider.profile.clone()))?
        } else {
            let mut base = ProviderProfile::builtin(&provider.profile)
                .unwrap_or_else(|_| ProviderProfile::custom(provider.profile.clone(), Vec::new()));
            base.endpoints = provider.endpoints.clone();
            base
        };
        if let Some(agent) = provider.user_agent.as_ref() {
            profile.user_agent = agent.clone();
        }
        for (name, value) in &provider.headers {
            profile.headers.insert(name.clone(), value.clone());
        }
        Ok(profile)
    }

    /// Loop configuration for chat sessions.
    pub fn loop_config(&self) -> AgentLoopConfig {
        let provider = &self.provider;
        let mut config = AgentLoopConfig::new()
            .model(provider.model.clone())
            .max_rounds(self.agent.max_rounds)
            .mode(self.agent.mode)
            .generation(GenerationParams {
                max_tokens: provider.max_tokens,
                temperature: provider.temperature,
                thinking: provider.thinking,
                thinking_budget: provider.thinking_budget,
            });
        if let Some(persona) = provider.persona.as_ref() {
            config = config.persona(persona.clone());
        }
        config.stopped_marker = self.agent.stopped_marker.clone();
        config.round_limit_marker = self.agent.round_limit_marker.clone();
        config
    }
}
