use clap::Subcommand;

use super::ask::AskArgs;
use super::chunk::ChunkArgs;
use super::config::ConfigArgs;
use super::diff::DiffArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Chat about a page file (interactive when no question is given)
    Ask(AskArgs),

    /// Split a file into page chunks
    Chunk(ChunkArgs),

    /// Classify the change between two reads of a page
    Diff(DiffArgs),

    /// Show or validate the effective configuration
    Config(ConfigArgs),
}
