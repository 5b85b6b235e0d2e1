//! Symbols command - list what a download would fetch

use anyhow::{Context, Result};
use kline_downloader::{list_symbols, Config, ExchangeClient, SymbolFilter};
use tracing::info;

pub fn run(config: Config) -> Result<()> {
    config.validate()?;

    let rt = tokio::runtime::Runtime::new()?;

    let client = ExchangeClient::new(&config.exchange)?;
    let filter = SymbolFilter::from_config(&config.exchange);

    info!("Listing symbols from {}", client.base_url());
    let symbols = rt
        .block_on(list_symbols(&client, &filter))
        .context("Failed to list symbols")?;

    println!("\n{}", "=".repeat(60));
    println!(
        "{} SYMBOLS (TRADING, quoted in {})",
        symbols.len(),
        config.exchange.quote_suffixes.join("/")
    );
    println!("{}", "=".repeat(60));
    for symbol in &symbols {
        println!("  {}", symbol);
    }
    println!("{}", "=".repeat(60));

    Ok(())
}
