//! Download orchestration: one fetch pass per interval, with a pause in between
//!
//! The pause is a fixed courtesy delay, stretched when the previous pass saw
//! the exchange ask for a break (`Retry-After`) or report the per-minute weight
//! budget as spent.

use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, FetchConfig};
use crate::error::FetchResult;
use crate::exchange::RateLimitStatus;
use crate::fetcher::{FetchBatch, KlineFetcher};
use crate::progress::ProgressReporter;
use crate::Symbol;

/// Window over which Binance counts request weight
const WEIGHT_WINDOW: Duration = Duration::from_secs(60);

/// Longest `Retry-After` honored between passes
const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Everything downloaded in one run, passes in configured interval order
#[derive(Debug)]
pub struct DownloadReport {
    pub symbols: Vec<Symbol>,
    pub passes: Vec<FetchBatch>,
}

impl DownloadReport {
    pub fn total_requests(&self) -> usize {
        self.passes.iter().map(FetchBatch::len).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.passes.iter().map(|p| p.failures().len()).sum()
    }

    pub fn total_records(&self) -> usize {
        self.passes.iter().map(FetchBatch::record_count).sum()
    }
}

pub struct Downloader {
    fetcher: KlineFetcher,
    fetch: FetchConfig,
}

impl Downloader {
    pub fn new(config: &Config) -> Self {
        Downloader {
            fetcher: KlineFetcher::from_config(config),
            fetch: config.fetch.clone(),
        }
    }

    pub fn fetcher(&self) -> &KlineFetcher {
        &self.fetcher
    }

    /// Run every configured pass over `symbols`.
    ///
    /// Under fail-fast a failing pass ends the run; later passes never start.
    pub async fn run(
        &self,
        symbols: &[Symbol],
        progress: &dyn ProgressReporter,
    ) -> FetchResult<DownloadReport> {
        let mut passes: Vec<FetchBatch> = Vec::with_capacity(self.fetch.intervals.len());

        for &interval in &self.fetch.intervals {
            if let Some(previous) = passes.last() {
                let delay = next_pass_delay(&self.fetch, previous.rate_limit());
                if !delay.is_zero() {
                    info!("Waiting {:?} before {} pass", delay, interval);
                    tokio::time::sleep(delay).await;
                }
            }

            let batch = self.fetcher.fetch_klines(symbols, interval, progress).await?;
            passes.push(batch);
        }

        Ok(DownloadReport {
            symbols: symbols.to_vec(),
            passes,
        })
    }
}

/// Pause before the next pass, given the rate-limit status seen in the previous one
pub fn next_pass_delay(config: &FetchConfig, observed: RateLimitStatus) -> Duration {
    let base = config.pass_delay();
    if !config.respect_rate_limit_headers {
        return base;
    }

    let mut delay = base;

    if let Some(mut retry_after) = observed.retry_after {
        if retry_after > MAX_RETRY_AFTER {
            warn!(
                "Retry-After of {:?} exceeds {:?}, capping it",
                retry_after, MAX_RETRY_AFTER
            );
            retry_after = MAX_RETRY_AFTER;
        }
        if retry_after > delay {
            warn!("Exchange asked to retry after {:?}", retry_after);
            delay = retry_after;
        }
    }

    if let Some(used) = observed.used_weight_1m {
        if used >= config.weight_limit && WEIGHT_WINDOW > delay {
            warn!(
                "Used weight {} reached limit {}, waiting out the window",
                used, config.weight_limit
            );
            delay = WEIGHT_WINDOW;
        }
    }

    delay
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_without_headers() {
        let config = FetchConfig::default();
        assert_eq!(
            next_pass_delay(&config, RateLimitStatus::default()),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_retry_after_stretches_delay() {
        let config = FetchConfig::default();
        let observed = RateLimitStatus {
            used_weight_1m: Some(10),
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(next_pass_delay(&config, observed), Duration::from_secs(5));
    }

    #[test]
    fn test_huge_retry_after_capped() {
        let config = FetchConfig::default();
        let observed = RateLimitStatus {
            used_weight_1m: None,
            retry_after: Some(Duration::from_secs(86_400)),
        };
        assert_eq!(next_pass_delay(&config, observed), MAX_RETRY_AFTER);
    }

    #[test]
    fn test_spent_weight_waits_out_window() {
        let config = FetchConfig::default();
        let observed = RateLimitStatus {
            used_weight_1m: Some(2400),
            retry_after: None,
        };
        assert_eq!(next_pass_delay(&config, observed), WEIGHT_WINDOW);

        let below = RateLimitStatus {
            used_weight_1m: Some(2399),
            retry_after: None,
        };
        assert_eq!(next_pass_delay(&config, below), Duration::from_secs(1));
    }

    #[test]
    fn test_headers_ignored_when_disabled() {
        let config = FetchConfig {
            respect_rate_limit_headers: false,
            pass_delay_ms: 250,
            ..FetchConfig::default()
        };
        let observed = RateLimitStatus {
            used_weight_1m: Some(5000),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(next_pass_delay(&config, observed), Duration::from_millis(250));
    }
}
