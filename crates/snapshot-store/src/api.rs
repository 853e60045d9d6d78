use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagelens_core_types::TabId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration as TokioDuration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::chunker;
use crate::diff::compare_snapshots;
use crate::hash::hash_text;
use crate::index::mem::{is_stale, HotIndex};
use crate::index::persist::{DurableStore, FileDurableStore};
use crate::metrics::{MetricsSnapshot, SnapMetrics};
use crate::model::{
    ChunkRef, DiffResult, PageInput, PushOutcome, Snapshot, SnapshotSource, SweepStats, TabEntry,
    TabMeta,
};
use crate::policy::{SnapPolicyView, MIN_SWEEP_INTERVAL_SEC};

/// Per-tab snapshot cache. Every operation is total: a missing tab, slot or
/// chunk degrades to an empty result.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn push(&self, tab: TabId, page: PageInput) -> PushOutcome;
    async fn get_chunks(
        &self,
        tab: TabId,
        source: SnapshotSource,
        indices: &[usize],
    ) -> Vec<ChunkRef>;
    async fn get_editor_content(
        &self,
        tab: TabId,
        source: SnapshotSource,
        key: &str,
    ) -> Option<String>;
    async fn get_meta(&self, tab: TabId) -> TabMeta;
    async fn prune_stale(&self) -> SweepStats;
    async fn clear_tab(&self, tab: TabId);

    fn status(&self) -> SnapshotStatus;
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStatus {
    pub tabs: usize,
    pub durable: bool,
    pub sweeper_running: bool,
    pub metrics: MetricsSnapshot,
}

#[derive(Clone)]
pub struct SnapshotStoreBuilder {
    policy: SnapPolicyView,
    metrics: SnapMetrics,
    durable: Option<Arc<dyn DurableStore>>,
}

impl SnapshotStoreBuilder {
    pub fn new(policy: SnapPolicyView) -> Self {
        Self {
            policy,
            metrics: SnapMetrics::default(),
            durable: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SnapMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Use `durable` instead of the directory named by `store_dir`.
    pub fn with_durable(mut self, durable: Arc<dyn DurableStore>) -> Self {
        self.durable = Some(durable);
        self
    }

    /// Build the store; the background sweeper starts when a tokio runtime
    /// is available and the policy enables it.
    pub fn build(self) -> Arc<TabSnapshotStore> {
        let durable = self.durable.or_else(|| {
            self.policy
                .store_dir
                .clone()
                .map(|dir| Arc::new(FileDurableStore::new(dir)) as Arc<dyn DurableStore>)
        });
        let store = Arc::new(TabSnapshotStore {
            policy: self.policy,
            metrics: self.metrics,
            hot: HotIndex::default(),
            durable,
            background: Mutex::new(None),
        });
        if tokio::runtime::Handle::try_current().is_ok() {
            store.start_background_sweeper();
        }
        store
    }
}

pub struct TabSnapshotStore {
    policy: SnapPolicyView,
    metrics: SnapMetrics,
    hot: HotIndex,
    durable: Option<Arc<dyn DurableStore>>,
    background: Mutex<Option<JoinHandle<()>>>,
}

impl TabSnapshotStore {
    pub fn policy(&self) -> &SnapPolicyView {
        &self.policy
    }

    pub fn metrics(&self) -> &SnapMetrics {
        &self.metrics
    }

    /// Build a snapshot of `page` taken at `now`.
    pub fn snapshot_of(&self, page: PageInput, now: DateTime<Utc>) -> Snapshot {
        let chunks = chunker::split_with_cap(
            &page.text,
            self.policy.chunk_size,
            self.policy.chunk_overlap,
            self.policy.max_chunks,
        );
        Snapshot {
            hash: hash_text("pg", &page.text),
            url: page.url,
            title: page.title,
            text: page.text,
            chunks,
            updated_at: now,
            editor_contents: page.editor_contents,
        }
    }

    pub async fn push_at(&self, tab: TabId, page: PageInput, now: DateTime<Utc>) -> PushOutcome {
        let snapshot = self.snapshot_of(page, now);
        let existing = self.load_entry(tab).await;

        let (entry, diff) = match existing {
            Some(old) if !is_stale(&old.latest.updated_at, now, self.policy.ttl()) => {
                let diff = compare_snapshots(&old.latest, &snapshot, &self.policy);
                (
                    TabEntry {
                        latest: snapshot.clone(),
                        previous: Some(old.latest),
                    },
                    diff,
                )
            }
            stale => {
                if stale.is_some() {
                    debug!(target: "snapshot-store", tab = %tab, "previous snapshot expired; starting fresh");
                }
                (
                    TabEntry {
                        latest: snapshot.clone(),
                        previous: None,
                    },
                    DiffResult::NoPrevious,
                )
            }
        };

        self.hot.upsert(tab, entry.clone());
        self.persist(tab, &entry).await;
        self.metrics.record_push(&diff);
        debug!(
            target: "snapshot-store",
            tab = %tab,
            kind = diff.kind(),
            chunks = snapshot.chunks.len(),
            "snapshot pushed"
        );
        PushOutcome { snapshot, diff }
    }

    pub async fn prune_stale_at(&self, now: DateTime<Utc>) -> SweepStats {
        let ttl = self.policy.ttl();
        let mut pruned = 0usize;

        for tab in self.hot.stale_tabs(now, ttl) {
            self.hot.remove(tab);
            self.forget_durable(tab).await;
            pruned += 1;
        }

        if let Some(durable) = &self.durable {
            let keys = match durable.keys().await {
                Ok(keys) => keys,
                Err(err) => {
                    warn!(target: "snapshot-store", error = %err, "listing durable entries failed");
                    self.metrics.record_persist_failure();
                    Vec::new()
                }
            };
            for key in keys {
                match durable.get(&key).await {
                    Ok(Some(entry)) if is_stale(&entry.latest.updated_at, now, ttl) => {
                        if let Err(err) = durable.delete(&key).await {
                            warn!(target: "snapshot-store", key = %key, error = %err, "durable delete failed");
                            self.metrics.record_persist_failure();
                        } else {
                            pruned += 1;
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(target: "snapshot-store", key = %key, error = %err, "dropping unreadable durable entry");
                        if let Err(err) = durable.delete(&key).await {
                            warn!(target: "snapshot-store", key = %key, error = %err, "durable delete failed");
                            self.metrics.record_persist_failure();
                        }
                    }
                }
            }
        }

        if pruned > 0 {
            self.metrics.record_prune(pruned);
            info!(target: "snapshot-store", pruned, "pruned stale tab entries");
        }
        SweepStats { pruned }
    }

    /// Spawn the periodic prune task. Holds only a weak reference, so the
    /// task ends once the store is dropped.
    pub fn start_background_sweeper(self: &Arc<Self>) {
        let interval_sec = self.policy.sweep_interval_sec;
        if interval_sec == 0 {
            return;
        }
        let mut guard = self.background.lock();
        if guard.is_some() {
            return;
        }
        let weak = Arc::downgrade(self);
        let period = TokioDuration::from_secs(interval_sec.max(MIN_SWEEP_INTERVAL_SEC));
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = weak.upgrade() else {
                    break;
                };
                store.prune_stale().await;
            }
        });
        *guard = Some(handle);
    }

    async fn load_entry(&self, tab: TabId) -> Option<TabEntry> {
        if let Some(entry) = self.hot.get(tab) {
            return Some(entry);
        }
        let durable = self.durable.as_ref()?;
        match durable.get(&tab.storage_key()).await {
            Ok(Some(entry)) => {
                self.hot.upsert(tab, entry.clone());
                Some(entry)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(target: "snapshot-store", tab = %tab, error = %err, "durable read failed");
                self.metrics.record_persist_failure();
                None
            }
        }
    }

    async fn persist(&self, tab: TabId, entry: &TabEntry) {
        let Some(durable) = &self.durable else {
            return;
        };
        if let Err(err) = durable.put(&tab.storage_key(), entry).await {
            warn!(target: "snapshot-store", tab = %tab, error = %err, "durable write failed");
            self.metrics.record_persist_failure();
        }
    }

    async fn forget_durable(&self, tab: TabId) {
        let Some(durable) = &self.durable else {
            return;
        };
        if let Err(err) = durable.delete(&tab.storage_key()).await {
            warn!(target: "snapshot-store", tab = %tab, error = %err, "durable delete failed");
            self.metrics.record_persist_failure();
        }
    }
}

#[async_trait]
impl SnapshotStore for TabSnapshotStore {
    async fn push(&self, tab: TabId, page: PageInput) -> PushOutcome {
        self.push_at(tab, page, Utc::now()).await
    }

    async fn get_chunks(
        &self,
        tab: TabId,
        source: SnapshotSource,
        indices: &[usize],
    ) -> Vec<ChunkRef> {
        let Some(entry) = self.load_entry(tab).await else {
            return Vec::new();
        };
        let Some(snapshot) = entry.slot(source) else {
            return Vec::new();
        };
        indices
            .iter()
            .filter_map(|&index| {
                snapshot.chunks.get(index).map(|content| ChunkRef {
                    index,
                    content: content.clone(),
                })
            })
            .collect()
    }

    async fn get_editor_content(
        &self,
        tab: TabId,
        source: SnapshotSource,
        key: &str,
    ) -> Option<String> {
        let entry = self.load_entry(tab).await?;
        entry
            .slot(source)?
            .editor_contents
            .as_ref()?
            .get(key)
            .map(|content| content.text.clone())
    }

    async fn get_meta(&self, tab: TabId) -> TabMeta {
        match self.load_entry(tab).await {
            Some(entry) => TabMeta {
                latest: Some(entry.latest.meta()),
                previous: entry.previous.as_ref().map(Snapshot::meta),
            },
            None => TabMeta::default(),
        }
    }

    async fn prune_stale(&self) -> SweepStats {
        self.prune_stale_at(Utc::now()).await
    }

    async fn clear_tab(&self, tab: TabId) {
        self.hot.remove(tab);
        self.forget_durable(tab).await;
        debug!(target: "snapshot-store", tab = %tab, "tab cleared");
    }

    fn status(&self) -> SnapshotStatus {
        SnapshotStatus {
            tabs: self.hot.len(),
            durable: self.durable.is_some(),
            sweeper_running: self
                .background
                .lock()
                .as_ref()
                .map(|handle| !handle.is_finished())
                .unwrap_or(false),
            metrics: self.metrics.snapshot(),
        }
    }
}

impl Drop for TabSnapshotStore {
    fn drop(&mut self) {
        if let Some(handle) = self.background.lock().take() {
            handle.abort();
        }
    }
}
