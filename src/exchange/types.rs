//! Binance API wire types and rate-limit headers

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header carrying the request weight used by this IP in the current minute
pub const USED_WEIGHT_HEADER: &str = "x-mbx-used-weight-1m";

/// Sent alongside 429/418 responses, in seconds
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// Response of `GET /exchangeInfo` (only the fields we need)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

/// One instrument listed by `exchangeInfo`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    /// e.g. "TRADING", "BREAK", "SETTLING", "PENDING_TRADING"
    pub status: String,
}

/// Error payload: `{"code": -1121, "msg": "Invalid symbol."}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

/// Rate-limit information reported by the exchange
///
/// Merging keeps the maximum of each field, so one status can summarize a whole pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub used_weight_1m: Option<u32>,
    pub retry_after: Option<Duration>,
}

impl RateLimitStatus {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let parse = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };

        RateLimitStatus {
            used_weight_1m: parse(USED_WEIGHT_HEADER).map(|w| w.min(u32::MAX as u64) as u32),
            retry_after: parse(RETRY_AFTER_HEADER).map(Duration::from_secs),
        }
    }

    pub fn merge(self, other: RateLimitStatus) -> RateLimitStatus {
        RateLimitStatus {
            used_weight_1m: self.used_weight_1m.max(other.used_weight_1m),
            retry_after: self.retry_after.max(other.retry_after),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_exchange_info_ignores_unknown_fields() {
        let info: ExchangeInfo = serde_json::from_str(
            r#"{
                "timezone": "UTC",
                "symbols": [
                    {"symbol": "BTCUSDT", "status": "TRADING", "contractType": "PERPETUAL"},
                    {"symbol": "ETHBTC", "status": "BREAK"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(info.symbols.len(), 2);
        assert_eq!(info.symbols[1].status, "BREAK");
    }

    #[test]
    fn test_rate_limit_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USED_WEIGHT_HEADER, HeaderValue::from_static("1187"));
        headers.insert(RETRY_AFTER_HEADER, HeaderValue::from_static("7"));

        let status = RateLimitStatus::from_headers(&headers);
        assert_eq!(status.used_weight_1m, Some(1187));
        assert_eq!(status.retry_after, Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_rate_limit_garbage_headers_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(USED_WEIGHT_HEADER, HeaderValue::from_static("lots"));

        assert_eq!(RateLimitStatus::from_headers(&headers), RateLimitStatus::default());
    }

    #[test]
    fn test_rate_limit_merge_keeps_maximum() {
        let a = RateLimitStatus {
            used_weight_1m: Some(40),
            retry_after: None,
        };
        let b = RateLimitStatus {
            used_weight_1m: Some(12),
            retry_after: Some(Duration::from_secs(2)),
        };

        let merged = a.merge(b);
        assert_eq!(merged.used_weight_1m, Some(40));
        assert_eq!(merged.retry_after, Some(Duration::from_secs(2)));
    }
}
