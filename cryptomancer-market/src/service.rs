//! Cached price lookups.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument};

use cryptomancer_cache::{CacheConfig, CacheError, FreshnessCache, LookupSource};
use cryptomancer_core::error::CryptomancerError;
use cryptomancer_core::traits::MarketDataSource;
use cryptomancer_core::types::PriceQuery;

/// Failure of a cached price lookup.
#[derive(Debug, Error)]
pub enum PriceError {
    /// The query failed validation; the upstream was not contacted.
    #[error(transparent)]
    InvalidQuery(#[from] CryptomancerError),

    /// No usable value could be produced.
    #[error(transparent)]
    Upstream(#[from] CacheError),
}

/// Market listings for one query, with cache provenance.
#[derive(Clone, Debug)]
pub struct MarketSnapshot {
    /// The normalized query
    pub query: PriceQuery,
    /// Raw upstream listing
    pub markets: Arc<serde_json::Value>,
    /// How the listing was obtained
    pub source: LookupSource,
    /// Age of the listing
    pub age: Duration,
    /// Masked upstream failure when a stale listing was served
    pub stale_reason: Option<String>,
}

/// Market data source behind a single-flight freshness cache.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct PriceService {
    source: Arc<dyn MarketDataSource>,
    cache: FreshnessCache<String, Arc<serde_json::Value>>,
}

impl PriceService {
    /// Creates a service with an empty cache.
    pub fn new(source: Arc<dyn MarketDataSource>, config: CacheConfig) -> Self {
        Self {
            source,
            cache: FreshnessCache::with_config(config),
        }
    }

    /// Name of the underlying provider.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// The cache in front of the provider.
    pub fn cache(&self) -> &FreshnessCache<String, Arc<serde_json::Value>> {
        &self.cache
    }

    /// Returns market listings for `query`, fetching only when the cached
    /// listing for its canonical key is missing or stale.
    #[instrument(skip(self), fields(source = self.source.name()))]
    pub async fn markets(&self, query: &PriceQuery) -> Result<MarketSnapshot, PriceError> {
        let query = query.normalized()?;
        let key = query.to_string();

        let source = Arc::clone(&self.source);
        let fetch_query = query.clone();
        let lookup = self
            .cache
            .get(key, move |_key| async move {
                source.fetch_markets(&fetch_query).await.map(Arc::new)
            })
            .await?;

        debug!(source = ?lookup.source, age_ms = lookup.age.as_millis() as u64, "Resolved market listing");

        Ok(MarketSnapshot {
            query,
            markets: lookup.value,
            source: lookup.source,
            age: lookup.age,
            stale_reason: lookup.stale_reason,
        })
    }
}
