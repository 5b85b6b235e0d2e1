//! HTTP client for the `exchangeInfo` and `klines` endpoints
//!
//! # Example
//! ```no_run
//! use kline_downloader::config::ExchangeConfig;
//! use kline_downloader::exchange::ExchangeClient;
//! use kline_downloader::{Interval, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ExchangeClient::new(&ExchangeConfig::default())?;
//!     let response = client.klines(&Symbol::new("BTCUSDT"), Interval::Day1).await?;
//!     println!("Fetched {} klines", response.klines.len());
//!     Ok(())
//! }
//! ```

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{ApiErrorBody, ExchangeInfo, RateLimitStatus};
use crate::config::ExchangeConfig;
use crate::error::{FetchError, FetchResult};
use crate::{Interval, KlineRecord, Symbol};

const EXCHANGE_INFO_ENDPOINT: &str = "exchangeInfo";
const KLINES_ENDPOINT: &str = "klines";

/// Bytes of a non-JSON error body kept in `FetchError::Api`
const MAX_ERROR_BODY: usize = 256;

/// Klines for one symbol plus the rate-limit headers of that response
#[derive(Debug, Clone)]
pub struct KlineResponse {
    pub klines: Vec<KlineRecord>,
    pub rate_limit: RateLimitStatus,
}

/// Binance futures public API client
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ExchangeClient {
    client: Client,
    base_url: String,
}

impl ExchangeClient {
    /// Client with reqwest's default pool, for one-off calls
    pub fn new(config: &ExchangeConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self::with_client(client, &config.base_url))
    }

    /// Client whose pool keeps up to `pool_size` idle connections alive
    pub fn pooled(config: &ExchangeConfig, pool_size: usize) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(pool_size)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self::with_client(client, &config.base_url))
    }

    fn with_client(client: Client, base_url: &str) -> Self {
        ExchangeClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /exchangeInfo`
    pub async fn exchange_info(&self) -> FetchResult<ExchangeInfo> {
        let (info, _) = self.get_json(EXCHANGE_INFO_ENDPOINT, &[]).await?;
        Ok(info)
    }

    /// `GET /klines?symbol=..&interval=..`
    pub async fn klines(&self, symbol: &Symbol, interval: Interval) -> FetchResult<KlineResponse> {
        debug!("Fetching klines: symbol={}, interval={}", symbol, interval);

        let params = [("symbol", symbol.as_str()), ("interval", interval.code())];
        let (klines, rate_limit) = self.get_json(KLINES_ENDPOINT, &params).await?;

        Ok(KlineResponse { klines, rate_limit })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: &[(&str, &str)],
    ) -> FetchResult<(T, RateLimitStatus)> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut request = self.client.get(&url);
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request.send().await?;
        let status = response.status();
        let rate_limit = RateLimitStatus::from_headers(response.headers());

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            return Err(FetchError::RateLimited {
                status: status.as_u16(),
                retry_after: rate_limit.retry_after,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let body = response.text().await?;
        let value = serde_json::from_str(&body)
            .map_err(|source| FetchError::Decode { endpoint, source })?;

        Ok((value, rate_limit))
    }
}

fn api_error(status: StatusCode, body: &str) -> FetchError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => FetchError::Api {
            status: status.as_u16(),
            code: Some(err.code),
            message: err.msg,
        },
        Err(_) => FetchError::Api {
            status: status.as_u16(),
            code: None,
            message: if body.is_empty() {
                status.to_string()
            } else {
                truncate_body(body)
            },
        },
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes)", &body[..end], body.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = ExchangeConfig {
            base_url: "http://localhost:9000/fapi/v1/".to_string(),
            ..ExchangeConfig::default()
        };
        let client = ExchangeClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000/fapi/v1");
    }

    #[test]
    fn test_api_error_parses_binance_body() {
        let err = api_error(
            StatusCode::BAD_REQUEST,
            r#"{"code":-1121,"msg":"Invalid symbol."}"#,
        );
        match err {
            FetchError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, Some(-1121));
                assert_eq!(message, "Invalid symbol.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_plain_body() {
        let err = api_error(StatusCode::INTERNAL_SERVER_ERROR, "");
        match err {
            FetchError::Api { code, message, .. } => {
                assert_eq!(code, None);
                assert_eq!(message, "500 Internal Server Error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_html_body_truncated() {
        let page = format!("<html><body>{}</body></html>", "é".repeat(500));
        let err = api_error(StatusCode::BAD_GATEWAY, &page);
        match err {
            FetchError::Api { code, message, .. } => {
                assert_eq!(code, None);
                assert!(message.starts_with("<html><body>"));
                assert!(message.ends_with(&format!("... ({} bytes)", page.len())));
                assert!(message.len() < MAX_ERROR_BODY + 32);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
