//! Request envelope and response payload translation for the Cloud Code
//! Assist streaming API.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::model::{InferenceRequest, StreamChunk, Usage};

/// Build the wire payload for `request` billed to `project`.
pub fn build_payload(request: &InferenceRequest, project: &str) -> Value {
    let mut inner = Map::new();
    inner.insert(
        "contents".into(),
        serde_json::to_value(&request.contents).unwrap_or_else(|_| json!([])),
    );
    if let Some(system) = request
        .system_instruction
        .as_deref()
        .filter(|text| !text.trim().is_empty())
    {
        inner.insert(
            "systemInstruction".into(),
            json!({ "role": "user", "parts": [{ "text": system }] }),
        );
    }
    if !request.tools.is_empty() {
        let declarations: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                })
            })
            .collect();
        inner.insert(
            "tools".into(),
            json!([{ "functionDeclarations": declarations }]),
        );
    }

    let params = &request.params;
    let mut generation = Map::new();
    generation.insert("maxOutputTokens".into(), json!(params.max_tokens));
    if let Some(temperature) = params.temperature {
        generation.insert("temperature".into(), json!(temperature));
    }
    if params.thinking {
        generation.insert(
            "thinkingConfig".into(),
            json!({ "includeThoughts": true, "thinkingBudget": params.thinking_budget }),
        );
    }
    inner.insert("generationConfig".into(), Value::Object(generation));

    json!({
        "project": project,
        "model": request.model,
        "request": Value::Object(inner),
    })
}

/// Decode one `data:` payload. Lines that are not valid JSON yield nothing.
pub fn decode_event(data: &str) -> Vec<StreamChunk> {
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(err) => {
            debug!(target: "inference", error = %err, "skipping malformed stream line");
            return Vec::new();
        }
    };
    // Cloud Code wraps the generate response; a bare response is accepted too.
    let response = value.get("response").unwrap_or(&value);
    let mut out = Vec::new();

    let candidate = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first());
    if let Some(candidate) = candidate {
        let parts = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array);
        for part in parts.into_iter().flatten() {
            if let Some(chunk) = decode_part(part) {
                out.push(chunk);
            }
        }
        if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str) {
            out.push(StreamChunk::Finish {
                reason: reason.to_string(),
            });
        }
    }

    if let Some(meta) = response.get("usageMetadata") {
        out.push(StreamChunk::Usage(decode_usage(meta)));
    }
    out
}

fn decode_part(part: &Value) -> Option<StreamChunk> {
    if let Some(call) = part.get("functionCall") {
        let name = call.get("name").and_then(Value::as_str)?.to_string();
        let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
        return Some(StreamChunk::ToolCall {
            name,
            args,
            part: part.clone(),
        });
    }
    let text = part.get("text").and_then(Value::as_str)?.to_string();
    let thought = part.get("thought").and_then(Value::as_bool).unwrap_or(false);
    if thought {
        Some(StreamChunk::Thinking {
            text,
            part: part.clone(),
        })
    } else {
        Some(StreamChunk::Text {
            text,
            part: part.clone(),
        })
    }
}

fn decode_usage(meta: &Value) -> Usage {
    let count = |key: &str| meta.get(key).and_then(Value::as_u64).unwrap_or(0);
    Usage {
        prompt_tokens: count("promptTokenCount"),
        output_tokens: count("candidatesTokenCount"),
        thinking_tokens: count("thoughtsTokenCount"),
        total_tokens: count("totalTokenCount"),
    }
}
