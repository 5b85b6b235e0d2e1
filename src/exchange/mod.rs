//! Binance USDⓈ-M futures REST client
//! Only public market data endpoints are used, no API key needed.

mod client;
mod types;

pub use client::{ExchangeClient, KlineResponse};
pub use types::*;
