use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pagelens_snapshot_store::split_with_cap;
use serde_json::json;
use tokio::fs;

use crate::config::Config;

#[derive(Args, Debug, Clone)]
pub struct ChunkArgs {
    /// Text or markdown file to split
    pub file: PathBuf,

    /// Chunk window in characters (defaults to snapshot.chunk_size)
    #[arg(long)]
    pub size: Option<usize>,

    /// Overlap between chunks in characters (defaults to snapshot.chunk_overlap)
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Print chunks as a JSON array
    #[arg(long)]
    pub json: bool,
}

pub async fn cmd_chunk(args: ChunkArgs, config: &Config) -> Result<()> {
    let text = fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let size = args.size.unwrap_or(config.snapshot.chunk_size);
    let overlap = args.overlap.unwrap_or(config.snapshot.chunk_overlap);
    let chunks = split_with_cap(&text, size, overlap, config.snapshot.max_chunks);

    if args.json {
        let value = json!({
            "file": args.file.display().to_string(),
            "chunk_size": size,
            "overlap": overlap,
            "chunks": chunks,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "{} chunk(s) from {} (size {}, overlap {})",
        chunks.len(),
        args.file.display(),
        size,
        overlap
    );
    for (index, chunk) in chunks.iter().enumerate() {
        println!();
        println!("--- chunk {} ({} chars) ---", index, chunk.chars().count());
        println!("{}", chunk);
    }
    Ok(())
}
