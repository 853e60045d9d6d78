use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::chunker::DEFAULT_MAX_CHUNKS;

/// Shortest period the background sweeper runs at.
pub const MIN_SWEEP_INTERVAL_SEC: u64 = 60;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapPolicyView {
    /// Age after which a tab's latest snapshot is treated as having no history.
    pub ttl_sec: u64,
    /// Changed-line ratio at or below which a diff is reported with its patch.
    pub small_diff_threshold: f64,
    /// Chunk window in characters.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Hard cap on chunks produced per snapshot.
    pub max_chunks: usize,
    /// Context lines around each hunk of the unified patch.
    pub diff_context: usize,
    /// Directory for the durable side-store; `None` keeps everything in memory.
    pub store_dir: Option<PathBuf>,
    /// Background prune period; 0 disables the sweeper. Values below
    /// [`MIN_SWEEP_INTERVAL_SEC`] are raised to it.
    pub sweep_interval_sec: u64,
}

impl Default for SnapPolicyView {
    fn default() -> Self {
        Self {
            ttl_sec: 30 * 60,
            small_diff_threshold: 0.3,
            chunk_size: 4_000,
            chunk_overlap: 200,
            max_chunks: DEFAULT_MAX_CHUNKS,
            diff_context: 3,
            store_dir: None,
            sweep_interval_sec: 300,
        }
    }
}

impl SnapPolicyView {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_sec.min(i64::MAX as u64) as i64)
    }
}
