//! Durable side-store for tab entries.
//!
//! Entries are keyed by [`TabId::storage_key`](pagelens_core_types::TabId::storage_key)
//! and stored as serialized [`TabEntry`] values. The snapshot store treats
//! this layer as best-effort: failures are logged and counted, never surfaced.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::{SnapErrKind, SnapError};
use crate::fs::{layout, reader, writer};
use crate::model::TabEntry;

pub type SnapResult<T> = Result<T, SnapError>;

#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> SnapResult<Option<TabEntry>>;
    async fn put(&self, key: &str, entry: &TabEntry) -> SnapResult<()>;
    async fn delete(&self, key: &str) -> SnapResult<()>;
    async fn keys(&self) -> SnapResult<Vec<String>>;
}

/// Process-local store; entries round-trip through JSON like the file store.
#[derive(Default)]
pub struct MemoryDurableStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryDurableStore {
    async fn get(&self, key: &str) -> SnapResult<Option<TabEntry>> {
        let guard = self.entries.read();
        match guard.get(key) {
            Some(raw) => serde_json::from_slice(raw)
                .map(Some)
                .map_err(|err| SnapErrKind::Corrupt(format!("{key}: {err}")).into()),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, entry: &TabEntry) -> SnapResult<()> {
        let raw = serde_json::to_vec(entry)
            .map_err(|err| SnapError::from(SnapErrKind::Internal(err.to_string())))?;
        self.entries.write().insert(key.to_string(), raw);
        Ok(())
    }

    async fn delete(&self, key: &str) -> SnapResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn keys(&self) -> SnapResult<Vec<String>> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// One JSON file per key under `root`, replaced atomically on every write.
pub struct FileDurableStore {
    root: PathBuf,
}

impl FileDurableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

async fn blocking<T, F>(op: F) -> SnapResult<T>
where
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|err| SnapError::from(SnapErrKind::Internal(err.to_string())))?
        .map_err(SnapError::from)
}

#[async_trait]
impl DurableStore for FileDurableStore {
    async fn get(&self, key: &str) -> SnapResult<Option<TabEntry>> {
        let path = layout::entry_path(&self.root, key);
        blocking(move || reader::read_json::<TabEntry>(&path)).await
    }

    async fn put(&self, key: &str, entry: &TabEntry) -> SnapResult<()> {
        let path = layout::entry_path(&self.root, key);
        let entry = entry.clone();
        blocking(move || writer::write_json(path, &entry).map(|_| ())).await
    }

    async fn delete(&self, key: &str) -> SnapResult<()> {
        let path = layout::entry_path(&self.root, key);
        blocking(move || writer::remove_file(&path)).await
    }

    async fn keys(&self) -> SnapResult<Vec<String>> {
        let root = self.root.clone();
        blocking(move || {
            let files = reader::list_files(&root)?;
            Ok(files
                .iter()
                .filter_map(|path| layout::key_from_path(path))
                .collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Snapshot;
    use chrono::Utc;

    fn entry(text: &str) -> TabEntry {
        TabEntry {
            latest: Snapshot {
                url: "https://example.test".into(),
                title: "Example".into(),
                text: text.into(),
                chunks: vec![text.into()],
                hash: "h".into(),
                updated_at: Utc::now(),
                editor_contents: None,
            },
            previous: None,
        }
    }

    #[tokio::test]
    async fn file_store_round_trips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDurableStore::new(dir.path().join("tabs"));
        assert!(store.get("snapshot_1").await.unwrap().is_none());
        assert!(store.keys().await.unwrap().is_empty());

        let value = entry("hello");
        store.put("snapshot_1", &value).await.unwrap();
        assert_eq!(store.get("snapshot_1").await.unwrap(), Some(value));
        assert_eq!(store.keys().await.unwrap(), vec!["snapshot_1".to_string()]);

        store.delete("snapshot_1").await.unwrap();
        store.delete("snapshot_1").await.unwrap();
        assert!(store.get("snapshot_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snapshot_9.json"), b"{not json").unwrap();
        let store = FileDurableStore::new(dir.path());
        let err = store.get("snapshot_9").await.unwrap_err();
        assert!(matches!(err.kind(), SnapErrKind::Corrupt(_)));
    }

    #[tokio::test]
    async fn memory_store_lists_sorted_keys() {
        let store = MemoryDurableStore::new();
        store.put("snapshot_2", &entry("b")).await.unwrap();
        store.put("snapshot_1", &entry("a")).await.unwrap();
        assert_eq!(
            store.keys().await.unwrap(),
            vec!["snapshot_1".to_string(), "snapshot_2".to_string()]
        );
        assert_eq!(store.len(), 2);
    }
}
