//! Concurrent kline fetching
//!
//! One pass requests the klines of every symbol at one interval. All requests
//! are driven concurrently on the calling task; results come back in completion
//! order, tagged with their submission index, and are put back into submission
//! order before the pass returns.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::config::{Config, ExchangeConfig};
use crate::error::{FetchError, FetchResult};
use crate::exchange::{ExchangeClient, RateLimitStatus};
use crate::progress::ProgressReporter;
use crate::{Interval, KlineRecord, Symbol};

/// What a pass does when one of its requests fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the pass on the first failure, dropping the requests still in flight
    #[default]
    FailFast,
    /// Wait for every request; failed symbols keep their error in their slot
    BestEffort,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailFast => write!(f, "fail-fast"),
            FailurePolicy::BestEffort => write!(f, "best-effort"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Ok(FailurePolicy::FailFast),
            "best-effort" => Ok(FailurePolicy::BestEffort),
            other => Err(format!(
                "Unknown failure policy '{}'. Valid: fail-fast, best-effort",
                other
            )),
        }
    }
}

/// Outcome of one symbol's request
#[derive(Debug)]
pub struct SymbolKlines {
    pub symbol: Symbol,
    pub result: FetchResult<Vec<KlineRecord>>,
}

impl SymbolKlines {
    pub fn klines(&self) -> Option<&[KlineRecord]> {
        self.result.as_deref().ok()
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of one fetch pass, `entries[i]` belonging to the i-th requested symbol
#[derive(Debug)]
pub struct FetchBatch {
    interval: Interval,
    entries: Vec<SymbolKlines>,
    rate_limit: RateLimitStatus,
}

impl FetchBatch {
    pub fn empty(interval: Interval) -> Self {
        FetchBatch {
            interval,
            entries: Vec::new(),
            rate_limit: RateLimitStatus::default(),
        }
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn entries(&self) -> &[SymbolKlines] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest used weight and longest retry-after seen during the pass
    pub fn rate_limit(&self) -> RateLimitStatus {
        self.rate_limit
    }

    /// Aggregated failure report (always empty under fail-fast)
    pub fn failures(&self) -> Vec<(&Symbol, &FetchError)> {
        self.entries
            .iter()
            .filter_map(|e| e.result.as_ref().err().map(|err| (&e.symbol, err)))
            .collect()
    }

    /// Total klines received across successful symbols
    pub fn record_count(&self) -> usize {
        self.entries
            .iter()
            .filter_map(SymbolKlines::klines)
            .map(<[KlineRecord]>::len)
            .sum()
    }
}

/// Issues one `klines` request per symbol, concurrently
#[derive(Debug, Clone)]
pub struct KlineFetcher {
    exchange: ExchangeConfig,
    max_concurrency: usize,
    policy: FailurePolicy,
}

impl KlineFetcher {
    pub fn new(exchange: ExchangeConfig, max_concurrency: usize, policy: FailurePolicy) -> Self {
        KlineFetcher {
            exchange,
            max_concurrency: max_concurrency.max(1),
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.exchange.clone(),
            config.fetch.max_concurrency,
            config.fetch.failure_policy,
        )
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// In-flight requests and pooled connections for a pass over `symbol_count` symbols
    pub fn pool_size(&self, symbol_count: usize) -> usize {
        symbol_count.clamp(1, self.max_concurrency)
    }

    /// Fetch the klines of every symbol at `interval`.
    ///
    /// The connection pool lives for exactly this call. An empty symbol list
    /// returns an empty batch without touching the network.
    pub async fn fetch_klines(
        &self,
        symbols: &[Symbol],
        interval: Interval,
        progress: &dyn ProgressReporter,
    ) -> FetchResult<FetchBatch> {
        if symbols.is_empty() {
            return Ok(FetchBatch::empty(interval));
        }

        let pool_size = self.pool_size(symbols.len());
        let client = ExchangeClient::pooled(&self.exchange, pool_size)?;

        info!(
            "Fetching {} klines for {} symbols ({} concurrent, {})",
            interval,
            symbols.len(),
            pool_size,
            self.policy
        );

        progress.on_start(interval, symbols.len());
        let batch = self
            .gather(&client, symbols, interval, pool_size, progress)
            .await;
        progress.on_finish();

        let batch = batch?;
        info!(
            "{} pass done: {} symbols, {} failed, {} klines",
            interval,
            batch.len(),
            batch.failures().len(),
            batch.record_count()
        );

        Ok(batch)
    }

    async fn gather(
        &self,
        client: &ExchangeClient,
        symbols: &[Symbol],
        interval: Interval,
        concurrency: usize,
        progress: &dyn ProgressReporter,
    ) -> FetchResult<FetchBatch> {
        let mut requests = stream::iter(symbols.iter().enumerate())
            .map(move |(index, symbol)| async move {
                (index, client.klines(symbol, interval).await)
            })
            .buffer_unordered(concurrency);

        let mut tagged = Vec::with_capacity(symbols.len());
        let mut rate_limit = RateLimitStatus::default();

        while let Some((index, result)) = requests.next().await {
            let symbol = &symbols[index];
            progress.on_complete(symbol, result.is_ok());

            let result = match result {
                Ok(response) => {
                    rate_limit = rate_limit.merge(response.rate_limit);
                    Ok(response.klines)
                }
                Err(err) => {
                    if let FetchError::RateLimited { retry_after, .. } = &err {
                        rate_limit = rate_limit.merge(RateLimitStatus {
                            used_weight_1m: None,
                            retry_after: *retry_after,
                        });
                    }

                    match self.policy {
                        FailurePolicy::FailFast => {
                            warn!("{} {} failed, aborting pass: {}", symbol, interval, err);
                            return Err(err.for_symbol(symbol));
                        }
                        FailurePolicy::BestEffort => {
                            warn!("{} {} failed: {}", symbol, interval, err);
                            Err(err)
                        }
                    }
                }
            };

            tagged.push((
                index,
                SymbolKlines {
                    symbol: symbol.clone(),
                    result,
                },
            ));
        }

        Ok(FetchBatch {
            interval,
            entries: into_submission_order(tagged),
            rate_limit,
        })
    }
}

/// Sort completion-ordered results back by their submission index
fn into_submission_order<T>(mut tagged: Vec<(usize, T)>) -> Vec<T> {
    tagged.sort_unstable_by_key(|(index, _)| *index);
    tagged.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;

    #[test]
    fn test_into_submission_order() {
        let tagged = vec![(2, "c"), (0, "a"), (3, "d"), (1, "b")];
        assert_eq!(into_submission_order(tagged), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_pool_size_capped() {
        let fetcher = KlineFetcher::new(ExchangeConfig::default(), 16, FailurePolicy::FailFast);
        assert_eq!(fetcher.pool_size(3), 3);
        assert_eq!(fetcher.pool_size(400), 16);
        assert_eq!(fetcher.pool_size(0), 1);
    }

    #[test]
    fn test_zero_concurrency_bumped_to_one() {
        let fetcher = KlineFetcher::new(ExchangeConfig::default(), 0, FailurePolicy::FailFast);
        assert_eq!(fetcher.pool_size(10), 1);
    }

    #[test]
    fn test_failure_policy_parse() {
        let parse = |s: &str| s.parse::<FailurePolicy>();
        assert_eq!(parse("fail-fast").unwrap(), FailurePolicy::FailFast);
        assert_eq!(parse("best_effort").unwrap(), FailurePolicy::BestEffort);
        assert_eq!(parse("Best-Effort").unwrap(), FailurePolicy::BestEffort);
        assert!(parse("retry").is_err());
        assert_eq!(FailurePolicy::BestEffort.to_string(), "best-effort");
    }

    #[test]
    fn test_batch_failures_and_record_count() {
        let batch = FetchBatch {
            interval: Interval::Day1,
            entries: vec![
                SymbolKlines {
                    symbol: Symbol::new("BTCUSDT"),
                    result: Ok(vec![serde_json::json!([1, "2"]), serde_json::json!([3, "4"])]),
                },
                SymbolKlines {
                    symbol: Symbol::new("ETHBUSD"),
                    result: Err(FetchError::Api {
                        status: 500,
                        code: None,
                        message: "boom".to_string(),
                    }),
                },
            ],
            rate_limit: RateLimitStatus::default(),
        };

        assert_eq!(batch.record_count(), 2);
        let failures = batch.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.as_str(), "ETHBUSD");
    }

    #[tokio::test]
    async fn test_empty_symbols_no_request() {
        // Unroutable base URL: any request would fail the test.
        let exchange = ExchangeConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..ExchangeConfig::default()
        };
        let fetcher = KlineFetcher::new(exchange, 4, FailurePolicy::FailFast);

        let batch = fetcher
            .fetch_klines(&[], Interval::Hour1, &NoProgress)
            .await
            .unwrap();

        assert!(batch.is_empty());
        assert_eq!(batch.interval(), Interval::Hour1);
    }
}
