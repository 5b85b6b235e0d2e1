//! Download command - list symbols, then fetch klines for each configured interval

use anyhow::{Context, Result};
use kline_downloader::progress::{ConsoleProgress, NoProgress, ProgressReporter};
use kline_downloader::{
    list_symbols, Config, Downloader, ExchangeClient, FailurePolicy, Interval, SymbolFilter,
};
use std::time::Instant;
use tracing::{info, warn};

/// CLI flags that override the loaded configuration
#[derive(Debug, Default)]
pub struct Overrides {
    pub intervals: Option<String>,
    pub policy: Option<String>,
    pub delay_ms: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub no_progress: bool,
}

impl Overrides {
    fn apply(self, config: &mut Config) -> Result<()> {
        if let Some(intervals) = self.intervals {
            let parsed = intervals
                .split(',')
                .map(str::parse::<Interval>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(anyhow::Error::msg)?;
            info!("Overriding intervals to: {:?}", parsed);
            config.fetch.intervals = parsed;
        }

        if let Some(policy) = self.policy {
            let policy: FailurePolicy = policy.parse().map_err(anyhow::Error::msg)?;
            info!("Overriding failure policy to: {}", policy);
            config.fetch.failure_policy = policy;
        }

        if let Some(delay_ms) = self.delay_ms {
            info!("Overriding pass delay to: {}ms", delay_ms);
            config.fetch.pass_delay_ms = delay_ms;
        }

        if let Some(max_concurrency) = self.max_concurrency {
            info!("Overriding max concurrency to: {}", max_concurrency);
            config.fetch.max_concurrency = max_concurrency;
        }

        if let Some(timeout_secs) = self.timeout_secs {
            info!("Overriding request timeout to: {}s", timeout_secs);
            config.exchange.request_timeout_secs = timeout_secs;
        }

        Ok(())
    }
}

/// `start` is taken at process start so the reported time covers the whole run
pub fn run(mut config: Config, overrides: Overrides, start: Instant) -> Result<()> {
    let show_progress = !overrides.no_progress;
    overrides.apply(&mut config)?;
    config.validate()?;

    let rt = tokio::runtime::Runtime::new()?;

    let client = ExchangeClient::new(&config.exchange)?;
    let filter = SymbolFilter::from_config(&config.exchange);
    let symbols = rt
        .block_on(list_symbols(&client, &filter))
        .context("Failed to list symbols")?;

    println!("Check {} symbols", symbols.len());

    let progress: Box<dyn ProgressReporter> = if show_progress {
        Box::new(ConsoleProgress::new(config.fetch.progress_intervals.clone()))
    } else {
        Box::new(NoProgress)
    };

    let downloader = Downloader::new(&config);
    let report = match rt.block_on(downloader.run(&symbols, progress.as_ref())) {
        Ok(report) => report,
        Err(err) if err.is_rate_limited() => {
            anyhow::bail!("Download aborted, exchange is throttling requests: {}", err)
        }
        Err(err) => return Err(anyhow::Error::new(err).context("Download aborted")),
    };

    println!("\n{}", "=".repeat(60));
    println!("DOWNLOAD COMPLETE ({})", downloader.fetcher().policy());
    println!("{}", "=".repeat(60));
    for pass in &report.passes {
        let used_weight = pass
            .rate_limit()
            .used_weight_1m
            .map(|w| w.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>4}: {} requests, {} failed, {} klines, used weight {}",
            pass.interval(),
            pass.len(),
            pass.failures().len(),
            pass.record_count(),
            used_weight
        );
        for (symbol, err) in pass.failures() {
            warn!("{} {}: {}", pass.interval(), symbol, err);
        }
    }
    println!("  Total klines:  {}", report.total_records());
    println!("  Failures:      {}/{}", report.total_failures(), report.total_requests());
    println!("{}", "=".repeat(60));

    println!("Total running time: {:.2}s", start.elapsed().as_secs_f64());

    Ok(())
}
