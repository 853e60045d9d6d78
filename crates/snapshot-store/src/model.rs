use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which of the two per-tab slots to read from.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    #[default]
    Latest,
    Previous,
}

impl std::str::FromStr for SnapshotSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "latest" | "" => Ok(SnapshotSource::Latest),
            "previous" => Ok(SnapshotSource::Previous),
            other => Err(format!("unknown snapshot source '{other}'")),
        }
    }
}

/// Text hosted by an editor or form field on the page.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct EditorContent {
    pub label: String,
    pub text: String,
}

/// Editor contents keyed by element type and ordinal, e.g. `monaco_1`.
pub type EditorContentMap = BTreeMap<String, EditorContent>;

/// Page content handed to [`push`](crate::SnapshotStore::push).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageInput {
    pub url: String,
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_contents: Option<EditorContentMap>,
}

impl PageInput {
    pub fn new(url: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            text: text.into(),
            editor_contents: None,
        }
    }

    pub fn with_editor_contents(mut self, contents: EditorContentMap) -> Self {
        self.editor_contents = Some(contents);
        self
    }
}

/// One immutable read of a tab's page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub url: String,
    pub title: String,
    pub text: String,
    pub chunks: Vec<String>,
    pub hash: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_contents: Option<EditorContentMap>,
}

impl Snapshot {
    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            url: self.url.clone(),
            title: self.title.clone(),
            total_chunks: self.chunks.len(),
            updated_at: self.updated_at,
        }
    }
}

/// Two-slot container persisted per tab.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TabEntry {
    pub latest: Snapshot,
    #[serde(default)]
    pub previous: Option<Snapshot>,
}

impl TabEntry {
    pub fn slot(&self, source: SnapshotSource) -> Option<&Snapshot> {
        match source {
            SnapshotSource::Latest => Some(&self.latest),
            SnapshotSource::Previous => self.previous.as_ref(),
        }
    }
}

/// Classified change between the replaced `latest` and a new push.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffResult {
    NoPrevious,
    Unchanged,
    UrlChanged {
        previous_url: String,
        url: String,
    },
    SmallDiff {
        patch: String,
        changed_lines: usize,
        total_lines: usize,
        changed_chunks: Vec<usize>,
    },
    LargeDiff {
        changed_lines: usize,
        total_lines: usize,
        changed_chunks: Vec<usize>,
    },
}

impl DiffResult {
    pub fn kind(&self) -> &'static str {
        match self {
            DiffResult::NoPrevious => "no_previous",
            DiffResult::Unchanged => "unchanged",
            DiffResult::UrlChanged { .. } => "url_changed",
            DiffResult::SmallDiff { .. } => "small_diff",
            DiffResult::LargeDiff { .. } => "large_diff",
        }
    }

    pub fn changed_chunks(&self) -> &[usize] {
        match self {
            DiffResult::SmallDiff { changed_chunks, .. }
            | DiffResult::LargeDiff { changed_chunks, .. } => changed_chunks,
            _ => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PushOutcome {
    pub snapshot: Snapshot,
    pub diff: DiffResult,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub index: usize,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub url: String,
    pub title: String,
    pub total_chunks: usize,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TabMeta {
    pub latest: Option<SnapshotMeta>,
    pub previous: Option<SnapshotMeta>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SweepStats {
    pub pruned: usize,
}
