//! Host collaborators the orchestrator calls out to: page extraction and
//! in-page writes.

use async_trait::async_trait;
use pagelens_core_types::{CoreError, TabId};
use pagelens_snapshot_store::{EditorContentMap, PageInput};
use serde::{Deserialize, Serialize};

/// Content read from a live tab.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_contents: Option<EditorContentMap>,
}

impl From<PageContent> for PageInput {
    fn from(page: PageContent) -> Self {
        PageInput {
            url: page.url,
            title: page.title,
            text: page.text,
            editor_contents: page.editor_contents,
        }
    }
}

/// Reads the current page of a tab. `Ok(None)` means the tab is restricted
/// or has nothing readable; the turn continues without page content.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, tab: TabId) -> Result<Option<PageContent>, CoreError>;
}

/// In-page find/replace. An empty `find` overwrites the whole editor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub tab: TabId,
    pub key: String,
    pub find: String,
    pub replace: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WriteResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait PageWriter: Send + Sync {
    async fn write(&self, request: WriteRequest) -> WriteResult;
}

/// Writer for hosts without a page-write channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPageWriter;

#[async_trait]
impl PageWriter for NoPageWriter {
    async fn write(&self, _request: WriteRequest) -> WriteResult {
        WriteResult::failed("page writes are not supported by this host")
    }
}
