//! Futures Kline Downloader
//!
//! Lists the actively traded Binance USDⓈ-M futures symbols quoted in stable
//! coins and downloads their klines at several intervals, one concurrent
//! request per symbol.
//!
//! ```no_run
//! use kline_downloader::progress::NoProgress;
//! use kline_downloader::{list_symbols, Config, Downloader, ExchangeClient, SymbolFilter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let client = ExchangeClient::new(&config.exchange)?;
//!     let symbols = list_symbols(&client, &SymbolFilter::from_config(&config.exchange)).await?;
//!
//!     let report = Downloader::new(&config).run(&symbols, &NoProgress).await?;
//!     println!("{} klines", report.total_records());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod exchange;
pub mod fetcher;
pub mod progress;
pub mod symbols;
pub mod types;

pub use config::Config;
pub use download::{DownloadReport, Downloader};
pub use error::{FetchError, FetchResult};
pub use exchange::ExchangeClient;
pub use fetcher::{FailurePolicy, FetchBatch, KlineFetcher, SymbolKlines};
pub use symbols::{list_symbols, SymbolFilter};
pub use types::*;
