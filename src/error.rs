//! Exchange request errors

use std::time::Duration;
use thiserror::Error;

use crate::Symbol;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, timeout, or a body that could not be read
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Body is not JSON, or lacks the fields the endpoint promises
    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP 429 (throttled) or 418 (IP banned after ignoring 429s)
    #[error("rate limited by exchange (HTTP {status}, retry after {retry_after:?})")]
    RateLimited {
        status: u16,
        retry_after: Option<Duration>,
    },

    /// Any other non-success status
    #[error("exchange returned HTTP {status}: {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// A per-symbol request failed inside a fetch pass
    #[error("{symbol}: {source}")]
    Symbol {
        symbol: Symbol,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    pub fn for_symbol(self, symbol: &Symbol) -> Self {
        FetchError::Symbol {
            symbol: symbol.clone(),
            source: Box::new(self),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        match self {
            FetchError::RateLimited { .. } => true,
            FetchError::Symbol { source, .. } => source.is_rate_limited(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err)
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_error_display_names_symbol() {
        let err = FetchError::Api {
            status: 400,
            code: Some(-1121),
            message: "Invalid symbol.".to_string(),
        }
        .for_symbol(&Symbol::new("FOOUSDT"));

        assert_eq!(
            err.to_string(),
            "FOOUSDT: exchange returned HTTP 400: Invalid symbol."
        );
    }

    #[test]
    fn test_rate_limited_seen_through_symbol_wrapper() {
        let err = FetchError::RateLimited {
            status: 429,
            retry_after: Some(Duration::from_secs(3)),
        }
        .for_symbol(&Symbol::new("BTCUSDT"));

        assert!(err.is_rate_limited());
    }
}
