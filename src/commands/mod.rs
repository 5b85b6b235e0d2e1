//! Subcommand implementations

pub mod download;
pub mod symbols;

use anyhow::{Context, Result};
use kline_downloader::Config;
use tracing::info;

/// Config file (or defaults) plus env, then the global CLI override
pub fn load_config(path: Option<&str>, base_url: Option<String>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let config = Config::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path))?;
            info!("Loaded configuration from: {}", path);
            config
        }
        None => Config::from_env(),
    };

    if let Some(base_url) = base_url {
        info!("Overriding base URL to: {}", base_url);
        config.exchange.base_url = base_url;
    }

    Ok(config)
}
