//! Kline downloader - main entry point
//!
//! This binary provides two subcommands:
//! - symbols: List the trading, stable-coin quoted futures symbols
//! - download: Download daily and hourly klines for all of them

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "kline-downloader")]
#[command(about = "Download klines for every trading Binance futures symbol", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to JSON configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Exchange REST base URL, e.g. "https://fapi.binance.com/fapi/v1"
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List symbols that would be downloaded
    Symbols,

    /// Download klines for every listed symbol
    Download {
        /// Intervals to fetch, in order (comma-separated). E.g., "1d,1h"
        #[arg(short, long)]
        intervals: Option<String>,

        /// What to do when a request fails: fail-fast or best-effort
        #[arg(short, long)]
        policy: Option<String>,

        /// Pause between passes in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Maximum concurrent requests per pass
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // Progress bar owns the console
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let start = Instant::now();
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Symbols => ("symbols", false),
        Commands::Download { no_progress, .. } => ("download", !no_progress),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    let config = commands::load_config(cli.config.as_deref(), cli.base_url)?;

    match cli.command {
        Commands::Symbols => commands::symbols::run(config),

        Commands::Download {
            intervals,
            policy,
            delay_ms,
            max_concurrency,
            timeout_secs,
            no_progress,
        } => commands::download::run(
            config,
            commands::download::Overrides {
                intervals,
                policy,
                delay_ms,
                max_concurrency,
                timeout_secs,
                no_progress,
            },
            start,
        ),
    }
}
