//! Symbol listing: which futures symbols are worth downloading

use tracing::info;

use crate::config::ExchangeConfig;
use crate::error::FetchResult;
use crate::exchange::{ExchangeClient, SymbolInfo};
use crate::Symbol;

/// Status of a symbol that is open for trading
pub const TRADING_STATUS: &str = "TRADING";

/// Keeps symbols that are trading and quoted in an accepted currency
#[derive(Debug, Clone)]
pub struct SymbolFilter {
    quote_suffixes: Vec<String>,
}

impl SymbolFilter {
    pub fn new<I, S>(quote_suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SymbolFilter {
            quote_suffixes: quote_suffixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &ExchangeConfig) -> Self {
        Self::new(config.quote_suffixes.iter().cloned())
    }

    pub fn accepts(&self, info: &SymbolInfo) -> bool {
        info.status == TRADING_STATUS
            && self
                .quote_suffixes
                .iter()
                .any(|suffix| info.symbol.ends_with(suffix.as_str()))
    }

    /// Filtered symbols, in exchange order
    pub fn apply<'a>(&self, infos: impl IntoIterator<Item = &'a SymbolInfo>) -> Vec<Symbol> {
        infos
            .into_iter()
            .filter(|info| self.accepts(info))
            .map(|info| Symbol::new(&info.symbol))
            .collect()
    }
}

impl Default for SymbolFilter {
    fn default() -> Self {
        Self::from_config(&ExchangeConfig::default())
    }
}

/// Fetch `exchangeInfo` once and return the symbols passing `filter`
pub async fn list_symbols(
    client: &ExchangeClient,
    filter: &SymbolFilter,
) -> FetchResult<Vec<Symbol>> {
    let info = client.exchange_info().await?;
    let symbols = filter.apply(&info.symbols);

    info!(
        "Exchange lists {} symbols, {} pass the filter",
        info.symbols.len(),
        symbols.len()
    );

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(symbol: &str, status: &str) -> SymbolInfo {
        SymbolInfo {
            symbol: symbol.to_string(),
            status: status.to_string(),
        }
    }

    #[test]
    fn test_excludes_non_trading_status() {
        let filter = SymbolFilter::default();
        assert!(filter.accepts(&info("BTCUSDT", "TRADING")));
        assert!(!filter.accepts(&info("BTCUSDT", "BREAK")));
        assert!(!filter.accepts(&info("BTCUSDT", "SETTLING")));
    }

    #[test]
    fn test_excludes_unaccepted_quote() {
        let filter = SymbolFilter::default();
        assert!(filter.accepts(&info("ETHBUSD", "TRADING")));
        assert!(!filter.accepts(&info("ETHBTC", "TRADING")));
        // suffix match, not substring
        assert!(!filter.accepts(&info("USDTBTC", "TRADING")));
    }

    #[test]
    fn test_apply_keeps_exchange_order_and_is_idempotent() {
        let infos = vec![
            info("XRPUSDT", "TRADING"),
            info("ETHBTC", "TRADING"),
            info("ADABUSD", "TRADING"),
            info("LUNAUSDT", "BREAK"),
            info("BTCUSDT", "TRADING"),
        ];
        let filter = SymbolFilter::default();

        let first = filter.apply(&infos);
        let second = filter.apply(&infos);

        let names: Vec<&str> = first.iter().map(Symbol::as_str).collect();
        assert_eq!(names, vec!["XRPUSDT", "ADABUSD", "BTCUSDT"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_suffixes() {
        let filter = SymbolFilter::new(["USDC"]);
        assert!(filter.accepts(&info("SOLUSDC", "TRADING")));
        assert!(!filter.accepts(&info("SOLUSDT", "TRADING")));
    }
}
