use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pagelens_core_types::TabId;
use pagelens_snapshot_store::{PageInput, SnapPolicyView, SnapshotStore, SnapshotStoreBuilder};
use serde_json::json;
use tokio::fs;

use crate::config::Config;

#[derive(Args, Debug, Clone)]
pub struct DiffArgs {
    /// Earlier read of the page
    pub old: PathBuf,

    /// Later read of the page
    pub new: PathBuf,

    /// URL recorded for both reads
    #[arg(long, default_value = "about:blank")]
    pub url: String,

    /// URL of the later read, to simulate navigation
    #[arg(long)]
    pub new_url: Option<String>,

    /// Changed-line ratio at or below which the patch is included
    #[arg(long)]
    pub threshold: Option<f64>,
}

pub async fn cmd_diff(args: DiffArgs, config: &Config) -> Result<()> {
    let old = fs::read_to_string(&args.old)
        .await
        .with_context(|| format!("Failed to read {}", args.old.display()))?;
    let new = fs::read_to_string(&args.new)
        .await
        .with_context(|| format!("Failed to read {}", args.new.display()))?;

    let policy = SnapPolicyView {
        small_diff_threshold: args
            .threshold
            .unwrap_or(config.snapshot.small_diff_threshold),
        store_dir: None,
        sweep_interval_sec: 0,
        ..config.snapshot.clone()
    };
    let store = SnapshotStoreBuilder::new(policy).build();
    let tab = TabId(0);
    store
        .push(tab, PageInput::new(args.url.clone(), "old", old))
        .await;
    let new_url = args.new_url.clone().unwrap_or_else(|| args.url.clone());
    let outcome = store.push(tab, PageInput::new(new_url, "new", new)).await;

    let value = json!({
        "diff": outcome.diff,
        "old_chunks": store.get_meta(tab).await.previous.map(|meta| meta.total_chunks),
        "new_chunks": outcome.snapshot.chunks.len(),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
