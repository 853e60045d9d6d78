use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use pagelens_core_types::TabId;

use crate::model::TabEntry;

/// In-process cache of tab entries; authoritative for the process lifetime.
#[derive(Default)]
pub struct HotIndex {
    tabs: DashMap<TabId, TabEntry>,
}

impl HotIndex {
    pub fn get(&self, tab: TabId) -> Option<TabEntry> {
        self.tabs.get(&tab).map(|entry| entry.clone())
    }

    pub fn upsert(&self, tab: TabId, entry: TabEntry) {
        self.tabs.insert(tab, entry);
    }

    pub fn remove(&self, tab: TabId) -> Option<TabEntry> {
        self.tabs.remove(&tab).map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Tabs whose latest snapshot is older than `ttl` at `now`.
    pub fn stale_tabs(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<TabId> {
        self.tabs
            .iter()
            .filter(|entry| is_stale(&entry.value().latest.updated_at, now, ttl))
            .map(|entry| *entry.key())
            .collect()
    }
}

pub fn is_stale(updated_at: &DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    now.signed_duration_since(*updated_at) > ttl
}
