//! Events and states of a chat turn.

use pagelens_inference::Usage;
use pagelens_snapshot_store::SnapshotSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether the model may mutate the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// Read-only: page chunks and editors can be read.
    #[default]
    Ask,
    /// Read-write: `write_editor` is declared and dispatched.
    Agent,
}

impl ChatMode {
    pub fn allows_writes(&self) -> bool {
        matches!(self, ChatMode::Agent)
    }
}

impl std::str::FromStr for ChatMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ask" => Ok(ChatMode::Ask),
            "agent" => Ok(ChatMode::Agent),
            other => Err(format!("unknown chat mode '{other}'")),
        }
    }
}

/// Turn state machine:
/// `Idle -> Preparing -> Streaming -> (ToolExecuting -> Streaming)* -> Done | Aborted | Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    #[default]
    Idle,
    Preparing,
    Streaming,
    ToolExecuting,
    Done,
    Aborted,
    Failed,
}

impl TurnStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnStatus::Done | TurnStatus::Aborted | TurnStatus::Failed)
    }
}

/// Caller-facing event, delivered in provider order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    TextDelta {
        text: String,
    },
    ThinkingDelta {
        text: String,
    },
    ToolCall {
        name: String,
        args: Value,
        /// Snapshot slot the call reads, when it reads one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<SnapshotSource>,
        round: u32,
    },
    Usage {
        usage: Usage,
    },
    Finish {
        reason: String,
    },
    Error {
        message: String,
    },
    TurnComplete {
        aborted: bool,
    },
}
