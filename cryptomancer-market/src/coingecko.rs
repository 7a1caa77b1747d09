//! CoinGecko-compatible market data client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use cryptomancer_core::constants::{DEFAULT_MARKET_API_URL, DEFAULT_MARKET_TIMEOUT_SECONDS};
use cryptomancer_core::error::{CryptomancerError, Result};
use cryptomancer_core::traits::MarketDataSource;
use cryptomancer_core::types::PriceQuery;

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

/// Market data client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketConfig {
    /// API base URL (e.g. "https://api.coingecko.com/api/v3")
    pub base_url: String,
    /// API key (optional, raises the upstream rate limit)
    pub api_key: Option<String>,
    /// Header the API key is sent in
    pub api_key_header: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MARKET_API_URL.into(),
            api_key: None,
            api_key_header: "x-cg-demo-api-key".into(),
            timeout_seconds: DEFAULT_MARKET_TIMEOUT_SECONDS,
        }
    }
}

impl MarketConfig {
    /// Creates a config pointing at a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Adds an API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// HTTP client for `/coins/markets`.
pub struct CoinGeckoClient {
    config: MarketConfig,
    markets_url: Url,
    http_client: reqwest::Client,
}

impl CoinGeckoClient {
    /// Creates a client for the public API.
    pub fn new() -> Result<Self> {
        Self::with_config(MarketConfig::default())
    }

    /// Creates a client with custom configuration.
    pub fn with_config(config: MarketConfig) -> Result<Self> {
        let markets_url = Url::parse(&format!(
            "{}/coins/markets",
            config.base_url.trim_end_matches('/')
        ))
        .map_err(|e| CryptomancerError::ConfigError(format!("invalid market API URL: {}", e)))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CryptomancerError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            config,
            markets_url,
            http_client,
        })
    }

    /// Builds the listing URL for a normalized query.
    fn markets_url(&self, query: &PriceQuery) -> Url {
        let mut url = self.markets_url.clone();
        url.query_pairs_mut()
            .append_pair("vs_currency", &query.vs_currency)
            .append_pair("order", "market_cap_desc")
            .append_pair("per_page", &query.per_page.to_string())
            .append_pair("page", &query.page.to_string())
            .append_pair("sparkline", "false");
        url
    }

    /// Fetches one page of market listings.
    #[instrument(skip(self), fields(currency = %query.vs_currency, per_page = query.per_page, page = query.page))]
    pub async fn markets(&self, query: &PriceQuery) -> Result<serde_json::Value> {
        let query = query.normalized()?;

        let mut request = self.http_client.get(self.markets_url(&query));
        if let Some(key) = &self.config.api_key {
            request = request.header(self.config.api_key_header.as_str(), key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CryptomancerError::ConnectionTimeout(e.to_string())
            } else {
                CryptomancerError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
                body.truncate(cut);
            }
            return Err(CryptomancerError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CryptomancerError::ConnectionTimeout(e.to_string())
                } else {
                    CryptomancerError::InvalidResponse(e.to_string())
                }
            })?;

        let Some(markets) = json.as_array() else {
            return Err(CryptomancerError::InvalidResponse(
                "expected a JSON array of markets".into(),
            ));
        };

        debug!(count = markets.len(), "Fetched market listings");
        Ok(json)
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn fetch_markets(&self, query: &PriceQuery) -> Result<serde_json::Value> {
        self.markets(query).await
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}
