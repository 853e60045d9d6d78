use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
    /// Whether `path` existed and was read.
    pub from_file: bool,
}

/// Default lookup order: `./config/pagelens.yaml`, then
/// `<config dir>/pagelens/config.yaml`.
pub fn default_config_path() -> Result<PathBuf> {
    let local_config = PathBuf::from("config/pagelens.yaml");
    if local_config.exists() {
        return Ok(local_config);
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("pagelens");
    path.push("config.yaml");
    Ok(path)
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    let loaded = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

        info!("Loaded configuration from: {}", config_path.display());
        LoadedConfig {
            config,
            path: config_path,
            from_file: true,
        }
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        LoadedConfig {
            config: Config::default(),
            path: config_path,
            from_file: false,
        }
    };
    loaded
        .config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", loaded.path.display()))?;
    Ok(loaded)
}
