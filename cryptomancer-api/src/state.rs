//! App state: config, cached price service, contest submissions.

use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use cryptomancer_cache::{CacheConfig, StalePolicy};
use cryptomancer_core::constants::DEFAULT_PORT;
use cryptomancer_core::error::Result;
use cryptomancer_contest::MemorySubmissionStore;
use cryptomancer_core::traits::{MarketDataSource, SubmissionStore};
use cryptomancer_market::{CoinGeckoClient, MarketConfig, PriceService};

/// API server configuration.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Port to listen on
    pub port: u16,
    /// Upstream market data client
    pub market: MarketConfig,
    /// Price cache
    pub cache: CacheConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            market: MarketConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Reads configuration from the environment (and `.env` if present).
    ///
    /// Unset or unparsable variables fall back to their defaults.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();

        let defaults = Self::default();
        let market = MarketConfig {
            base_url: std::env::var("MARKET_API_URL").unwrap_or(defaults.market.base_url),
            api_key: std::env::var("MARKET_API_KEY").ok().filter(|k| !k.is_empty()),
            api_key_header: std::env::var("MARKET_API_KEY_HEADER")
                .unwrap_or(defaults.market.api_key_header),
            timeout_seconds: env_parse("MARKET_TIMEOUT_SECONDS")
                .unwrap_or(defaults.market.timeout_seconds),
        };
        let cache = CacheConfig {
            ttl_seconds: env_parse("PRICE_CACHE_TTL_SECONDS").unwrap_or(defaults.cache.ttl_seconds),
            fetch_timeout_ms: env_parse("PRICE_FETCH_TIMEOUT_MS")
                .unwrap_or(defaults.cache.fetch_timeout_ms),
            stale_policy: env_parse::<StalePolicy>("PRICE_STALE_POLICY")
                .unwrap_or(defaults.cache.stale_policy),
        };

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            market,
            cache,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparsable environment variable");
            None
        }
    }
}

/// Shared handler state.
pub struct AppState {
    /// Active configuration
    pub config: ApiConfig,
    /// Cached market data
    pub prices: PriceService,
    /// Contest submissions
    pub submissions: Arc<dyn SubmissionStore>,
    /// When the state was built, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Builds state backed by the configured CoinGecko-compatible API.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = CoinGeckoClient::with_config(config.market.clone())?;
        Ok(Self::with_source(config, Arc::new(client)))
    }

    /// Builds state backed by any market data source, with in-memory
    /// submissions.
    pub fn with_source(config: ApiConfig, source: Arc<dyn MarketDataSource>) -> Self {
        let prices = PriceService::new(source, config.cache.clone());
        Self {
            config,
            prices,
            submissions: Arc::new(MemorySubmissionStore::new()),
            started_at: Instant::now(),
        }
    }
}
