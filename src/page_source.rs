//! File-backed page for the CLI.
//!
//! The file plays the role of a tab: its text is the page content and it is
//! also exposed as the editor `file_1`, which `write_editor` edits in place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use agent_core::{PageContent, PageExtractor, PageWriter, WriteRequest, WriteResult};
use async_trait::async_trait;
use pagelens_core_types::{CoreError, TabId};
use pagelens_snapshot_store::{EditorContent, EditorContentMap};
use tokio::fs;
use tracing::{debug, info};

pub const FILE_EDITOR_KEY: &str = "file_1";

pub struct FilePage {
    path: PathBuf,
    url: String,
    title: String,
}

impl FilePage {
    /// `url` defaults to the file's `file://` URL and `title` to its name.
    pub fn new(path: impl Into<PathBuf>, url: Option<String>, title: Option<String>) -> Self {
        let path = path.into();
        let url = url.unwrap_or_else(|| file_url(&path));
        let title = title.unwrap_or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        Self { path, url, title }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn file_url(path: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

#[async_trait]
impl PageExtractor for FilePage {
    async fn extract(&self, tab: TabId) -> Result<Option<PageContent>, CoreError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(tab = %tab, path = %self.path.display(), "page file is missing");
                return Ok(None);
            }
            Err(err) => {
                return Err(CoreError::new(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )))
            }
        };
        let mut editors = EditorContentMap::new();
        editors.insert(
            FILE_EDITOR_KEY.to_string(),
            EditorContent {
                label: self.title.clone(),
                text: text.clone(),
            },
        );
        debug!(tab = %tab, bytes = text.len(), "page file read");
        Ok(Some(PageContent {
            url: self.url.clone(),
            title: self.title.clone(),
            text,
            editor_contents: Some(editors),
        }))
    }
}

#[async_trait]
impl PageWriter for FilePage {
    async fn write(&self, request: WriteRequest) -> WriteResult {
        if request.key != FILE_EDITOR_KEY {
            return WriteResult::failed(format!("no editor with key '{}'", request.key));
        }
        let current = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) => return WriteResult::failed(format!("failed to read page file: {err}")),
        };
        let updated = match apply_edit(&current, &request.find, &request.replace) {
            Some(updated) => updated,
            None => return WriteResult::failed("text to replace was not found in the editor"),
        };
        match fs::write(&self.path, updated).await {
            Ok(()) => {
                info!(path = %self.path.display(), "page file updated");
                WriteResult::ok()
            }
            Err(err) => WriteResult::failed(format!("failed to write page file: {err}")),
        }
    }
}

/// Replace the first occurrence of `find`; an empty `find` replaces
/// everything.
pub fn apply_edit(current: &str, find: &str, replace: &str) -> Option<String> {
    if find.is_empty() {
        return Some(replace.to_string());
    }
    current
        .find(find)
        .map(|at| format!("{}{}{}", &current[..at], replace, &current[at + find.len()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_replaces_first_match_or_everything() {
        assert_eq!(apply_edit("a teh b teh", "teh", "the").as_deref(), Some("a the b teh"));
        assert_eq!(apply_edit("anything", "", "new").as_deref(), Some("new"));
        assert_eq!(apply_edit("abc", "xyz", "q"), None);
    }

    #[tokio::test]
    async fn reads_and_edits_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "Hello wrold").await.unwrap();
        let page = FilePage::new(&path, Some("https://notes.test/".into()), None);

        let content = page.extract(TabId(1)).await.unwrap().unwrap();
        assert_eq!(content.url, "https://notes.test/");
        assert_eq!(content.title, "notes.md");
        assert_eq!(
            content.editor_contents.unwrap()[FILE_EDITOR_KEY].text,
            "Hello wrold"
        );

        let result = page
            .write(WriteRequest {
                tab: TabId(1),
                key: FILE_EDITOR_KEY.into(),
                find: "wrold".into(),
                replace: "world".into(),
            })
            .await;
        assert!(result.success);
        assert_eq!(fs::read_to_string(&path).await.unwrap(), "Hello world");

        let result = page
            .write(WriteRequest {
                tab: TabId(1),
                key: "monaco_1".into(),
                find: String::new(),
                replace: "x".into(),
            })
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn missing_file_is_no_content() {
        let dir = tempfile::tempdir().unwrap();
        let page = FilePage::new(dir.path().join("gone.md"), None, None);
        assert!(page.extract(TabId(1)).await.unwrap().is_none());
        assert!(page.url().starts_with("file://"));
    }
}
