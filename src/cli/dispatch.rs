use anyhow::Result;

use super::ask::cmd_ask;
use super::chunk::cmd_chunk;
use super::commands::Commands;
use super::config::cmd_config;
use super::diff::cmd_diff;
use super::env::CliArgs;
use super::runtime::LoadedConfig;

pub async fn dispatch(cli: &CliArgs, loaded: &LoadedConfig) -> Result<()> {
    match cli.command.clone() {
        Commands::Ask(args) => cmd_ask(args, &loaded.config).await,
        Commands::Chunk(args) => cmd_chunk(args, &loaded.config).await,
        Commands::Diff(args) => cmd_diff(args, &loaded.config).await,
        Commands::Config(args) => cmd_config(args, loaded),
    }
}
