//! Per-tab page snapshots for the pagelens chat core.
//!
//! Page text pushed for a tab is split into stable, position-addressed
//! chunks and compared against the snapshot it replaces. Each tab keeps
//! exactly two slots (`latest` and `previous`); stale entries age out after
//! the configured TTL.

pub mod api;
pub mod chunker;
pub mod diff;
pub mod errors;
pub mod fs;
pub mod hash;
pub mod index;
pub mod metrics;
pub mod model;
pub mod policy;

pub use api::{SnapshotStatus, SnapshotStore, SnapshotStoreBuilder, TabSnapshotStore};
pub use chunker::{split, split_with_cap, DEFAULT_MAX_CHUNKS};
pub use diff::compare_snapshots;
pub use errors::{SnapErrKind, SnapError};
pub use index::persist::{DurableStore, FileDurableStore, MemoryDurableStore};
pub use metrics::{MetricsSnapshot, SnapMetrics};
pub use model::{
    ChunkRef, DiffResult, EditorContent, EditorContentMap, PageInput, PushOutcome, Snapshot,
    SnapshotMeta, SnapshotSource, SweepStats, TabEntry, TabMeta,
};
pub use policy::{SnapPolicyView, MIN_SWEEP_INTERVAL_SEC};
