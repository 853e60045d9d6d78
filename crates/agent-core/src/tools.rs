//! Page tools offered to the model and their dispatch.

use pagelens_core_types::TabId;
use pagelens_inference::ToolDeclaration;
use pagelens_snapshot_store::{SnapshotSource, SnapshotStore};
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use tracing::debug;

use crate::agent_loop::types::ChatMode;
use crate::errors::ToolError;
use crate::ports::{PageWriter, WriteRequest};

pub const READ_PAGE_CHUNKS: &str = "read_page_chunks";
pub const READ_EDITOR: &str = "read_editor";
pub const WRITE_EDITOR: &str = "write_editor";

/// A model tool call resolved to a known tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    ReadPageChunks {
        source: SnapshotSource,
        indices: Vec<usize>,
    },
    ReadEditor {
        source: SnapshotSource,
        keys: Vec<String>,
    },
    WriteEditor {
        key: String,
        find: String,
        replace: String,
    },
    Unknown {
        name: String,
    },
}

#[derive(Deserialize)]
struct ReadChunksArgs {
    #[serde(default)]
    source: SnapshotSource,
    #[serde(default)]
    indices: Vec<Number>,
}

#[derive(Deserialize)]
struct ReadEditorArgs {
    #[serde(default)]
    source: SnapshotSource,
    #[serde(default)]
    keys: Vec<String>,
}

#[derive(Deserialize)]
struct WriteEditorArgs {
    key: String,
    #[serde(default)]
    find: String,
    replace: String,
}

impl ToolInvocation {
    /// Resolve a call by name. Unknown names parse successfully into
    /// [`ToolInvocation::Unknown`]; malformed arguments for a known tool fail.
    pub fn parse(name: &str, args: &Value) -> Result<Self, ToolError> {
        let args = if args.is_null() { json!({}) } else { args.clone() };
        match name {
            READ_PAGE_CHUNKS => {
                let parsed: ReadChunksArgs = serde_json::from_value(args)
                    .map_err(|err| ToolError::invalid_arguments(name, err.to_string()))?;
                Ok(ToolInvocation::ReadPageChunks {
                    source: parsed.source,
                    indices: parsed.indices.iter().filter_map(chunk_index).collect(),
                })
            }
            READ_EDITOR => {
                let parsed: ReadEditorArgs = serde_json::from_value(args)
                    .map_err(|err| ToolError::invalid_arguments(name, err.to_string()))?;
                Ok(ToolInvocation::ReadEditor {
                    source: parsed.source,
                    keys: parsed.keys,
                })
            }
            WRITE_EDITOR => {
                let parsed: WriteEditorArgs = serde_json::from_value(args)
                    .map_err(|err| ToolError::invalid_arguments(name, err.to_string()))?;
                Ok(ToolInvocation::WriteEditor {
                    key: parsed.key,
                    find: parsed.find,
                    replace: parsed.replace,
                })
            }
            other => Ok(ToolInvocation::Unknown {
                name: other.to_string(),
            }),
        }
    }

    /// Snapshot slot a read tool targets.
    pub fn source(&self) -> Option<SnapshotSource> {
        match self {
            ToolInvocation::ReadPageChunks { source, .. }
            | ToolInvocation::ReadEditor { source, .. } => Some(*source),
            _ => None,
        }
    }
}

// Models sometimes send indices as floats.
fn chunk_index(number: &Number) -> Option<usize> {
    if let Some(value) = number.as_u64() {
        return usize::try_from(value).ok();
    }
    number
        .as_f64()
        .filter(|value| value.is_finite() && *value >= 0.0 && value.fract() == 0.0)
        .map(|value| value as usize)
}

/// Everything a tool needs to run against the active tab.
pub struct ToolContext<'a> {
    pub tab: TabId,
    pub mode: ChatMode,
    pub store: &'a dyn SnapshotStore,
    pub writer: &'a dyn PageWriter,
}

/// Run one invocation and return the JSON response for the model.
pub async fn execute(
    invocation: &ToolInvocation,
    ctx: &ToolContext<'_>,
) -> Result<Value, ToolError> {
    match invocation {
        ToolInvocation::ReadPageChunks { source, indices } => {
            let chunks = ctx.store.get_chunks(ctx.tab, *source, indices).await;
            debug!(
                target: "agent-loop",
                tab = %ctx.tab,
                requested = indices.len(),
                returned = chunks.len(),
                "read page chunks"
            );
            Ok(json!({ "chunks": chunks }))
        }
        ToolInvocation::ReadEditor { source, keys } => {
            let mut contents = Map::new();
            for key in keys {
                if let Some(text) = ctx.store.get_editor_content(ctx.tab, *source, key).await {
                    contents.insert(key.clone(), Value::String(text));
                }
            }
            Ok(json!({ "contents": contents }))
        }
        ToolInvocation::WriteEditor { key, find, replace } => {
            if !ctx.mode.allows_writes() {
                return Err(ToolError::NotPermitted(WRITE_EDITOR.to_string()));
            }
            let result = ctx
                .writer
                .write(WriteRequest {
                    tab: ctx.tab,
                    key: key.clone(),
                    find: find.clone(),
                    replace: replace.clone(),
                })
                .await;
            if result.success {
                Ok(json!({ "success": true }))
            } else {
                Err(ToolError::WriteFailed(
                    result.error.unwrap_or_else(|| "unknown error".to_string()),
                ))
            }
        }
        ToolInvocation::Unknown { name } => Err(ToolError::UnknownTool(name.clone())),
    }
}

/// Declarations sent with every round. `write_editor` only in agent mode.
pub fn declarations(mode: ChatMode) -> Vec<ToolDeclaration> {
    let source = json!({
        "type": "string",
        "enum": ["latest", "previous"],
        "description": "Which read of the page to use. Defaults to latest."
    });
    let mut tools = vec![
        ToolDeclaration {
            name: READ_PAGE_CHUNKS.to_string(),
            description: "Read chunks of the page text by 0-based index.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "source": source,
                    "indices": { "type": "array", "items": { "type": "integer" } }
                },
                "required": ["indices"]
            }),
        },
        ToolDeclaration {
            name: READ_EDITOR.to_string(),
            description: "Read the full text of code editors or form fields by key.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "source": source,
                    "keys": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["keys"]
            }),
        },
    ];
    if mode.allows_writes() {
        tools.push(ToolDeclaration {
            name: WRITE_EDITOR.to_string(),
            description: "Replace text inside an editor on the live page. An empty `find` overwrites the whole editor.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "key": { "type": "string" },
                    "find": { "type": "string" },
                    "replace": { "type": "string" }
                },
                "required": ["key", "replace"]
            }),
        });
    }
    tools
}
