//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files, with an environment
//! variable override for the exchange endpoint. Every field has a default, so
//! the downloader runs without any config file at all.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::fetcher::FailurePolicy;
use crate::Interval;

/// Env var overriding `exchange.base_url`
pub const BASE_URL_ENV: &str = "BINANCE_FAPI_BASE_URL";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                self.exchange.base_url = base_url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.exchange.base_url.trim().is_empty() {
            anyhow::bail!("exchange.base_url must not be empty");
        }
        if self.exchange.quote_suffixes.is_empty() {
            anyhow::bail!("exchange.quote_suffixes must list at least one quote currency");
        }
        if self.exchange.request_timeout_secs == 0 {
            anyhow::bail!("exchange.request_timeout_secs must be at least 1");
        }
        if self.fetch.intervals.is_empty() {
            anyhow::bail!("fetch.intervals must list at least one interval");
        }
        if self.fetch.max_concurrency == 0 {
            anyhow::bail!("fetch.max_concurrency must be at least 1");
        }
        Ok(())
    }
}

/// Exchange endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Prefix for `/exchangeInfo` and `/klines`
    pub base_url: String,
    /// Symbols must end with one of these to be downloaded
    pub quote_suffixes: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            base_url: "https://fapi.binance.com/fapi/v1".to_string(),
            quote_suffixes: vec!["BUSD".to_string(), "USDT".to_string()],
            request_timeout_secs: 30,
        }
    }
}

impl ExchangeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Fetch pass configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// One pass per interval, in this order
    pub intervals: Vec<Interval>,
    /// Pause between consecutive passes
    pub pass_delay_ms: u64,
    /// Upper bound on in-flight requests and pooled connections per pass
    pub max_concurrency: usize,
    pub failure_policy: FailurePolicy,
    /// Stretch the pause when the exchange reports heavy weight usage or asks to back off
    pub respect_rate_limit_headers: bool,
    /// Request weight per minute allowed for one IP (Binance futures: 2400)
    pub weight_limit: u32,
    /// Passes that get a console progress bar
    pub progress_intervals: Vec<Interval>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            intervals: vec![Interval::Day1, Interval::Hour1],
            pass_delay_ms: 1000,
            max_concurrency: 256,
            failure_policy: FailurePolicy::FailFast,
            respect_rate_limit_headers: true,
            weight_limit: 2400,
            progress_intervals: vec![Interval::Hour1],
        }
    }
}

impl FetchConfig {
    pub fn pass_delay(&self) -> Duration {
        Duration::from_millis(self.pass_delay_ms)
    }
}
