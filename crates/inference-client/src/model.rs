use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::InferenceError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One conversation turn. Parts are kept in provider-native JSON so that
/// opaque fields such as thought signatures survive a round trip verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Value>,
}

impl Content {
    pub fn user(parts: Vec<Value>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(parts: Vec<Value>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![part::text(text)])
    }

    /// Concatenated plain text of all non-thought text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| !part::is_thought(p))
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect()
    }
}

/// Builders and predicates for provider-native parts.
pub mod part {
    use super::*;

    pub fn text(text: impl Into<String>) -> Value {
        json!({ "text": text.into() })
    }

    pub fn function_call(name: &str, args: Value) -> Value {
        json!({ "functionCall": { "name": name, "args": args } })
    }

    pub fn function_response(name: &str, response: Value) -> Value {
        json!({ "functionResponse": { "name": name, "response": response } })
    }

    pub fn is_thought(part: &Value) -> bool {
        part.get("thought").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn has_signature(part: &Value) -> bool {
        part.get("thoughtSignature").is_some()
    }

    pub fn is_function_call(part: &Value) -> bool {
        part.get("functionCall").is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Ask the model to emit its reasoning as thought parts.
    pub thinking: bool,
    pub thinking_budget: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 8_192,
            temperature: None,
            thinking: false,
            thinking_budget: 8_192,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub model: String,
    pub contents: Vec<Content>,
    #[serde(default)]
    pub system_instruction: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolDeclaration>,
    #[serde(default)]
    pub params: GenerationParams,
}

impl InferenceRequest {
    pub fn new(model: impl Into<String>, contents: Vec<Content>) -> Self {
        Self {
            model: model.into(),
            contents,
            system_instruction: None,
            tools: Vec::new(),
            params: GenerationParams::default(),
        }
    }

    pub fn with_system_instruction(mut self, text: impl Into<String>) -> Self {
        self.system_instruction = Some(text.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub output_tokens: u64,
    pub thinking_tokens: u64,
    pub total_tokens: u64,
}

/// Typed event decoded from the response stream. Content events carry the
/// raw provider part they were derived from.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamChunk {
    Text { text: String, part: Value },
    Thinking { text: String, part: Value },
    ToolCall { name: String, args: Value, part: Value },
    Finish { reason: String },
    Usage(Usage),
    Error(InferenceError),
}

impl StreamChunk {
    /// Provider-native part backing this event, if it is a content event.
    pub fn part(&self) -> Option<&Value> {
        match self {
            StreamChunk::Text { part, .. }
            | StreamChunk::Thinking { part, .. }
            | StreamChunk::ToolCall { part, .. } => Some(part),
            _ => None,
        }
    }
}
