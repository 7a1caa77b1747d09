//! Cache configuration.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cryptomancer_core::constants::{DEFAULT_CACHE_TTL_SECONDS, DEFAULT_FETCH_TIMEOUT_MS};
use cryptomancer_core::error::CryptomancerError;

/// What to return when a refresh fails but an older value is still held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Serve the stale value, flagged as [`LookupSource::Stale`](crate::LookupSource::Stale).
    #[default]
    ServeStale,
    /// Surface the failure even if a stale value exists.
    Fail,
}

impl FromStr for StalePolicy {
    type Err = CryptomancerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serve_stale" | "serve-stale" | "stale" => Ok(StalePolicy::ServeStale),
            "fail" | "strict" => Ok(StalePolicy::Fail),
            other => Err(CryptomancerError::ConfigError(format!(
                "unknown stale policy '{}' (expected serve_stale or fail)",
                other
            ))),
        }
    }
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window in seconds; 0 means every lookup fetches
    pub ttl_seconds: u64,
    /// Upper bound on one upstream fetch, in milliseconds
    pub fetch_timeout_ms: u64,
    /// Behaviour when a refresh fails over a stale value
    pub stale_policy: StalePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            stale_policy: StalePolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Sets the freshness window.
    pub fn with_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Sets the fetch timeout.
    pub fn with_fetch_timeout_ms(mut self, fetch_timeout_ms: u64) -> Self {
        self.fetch_timeout_ms = fetch_timeout_ms;
        self
    }

    /// Sets the stale-on-failure policy.
    pub fn with_stale_policy(mut self, stale_policy: StalePolicy) -> Self {
        self.stale_policy = stale_policy;
        self
    }

    pub(crate) fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub(crate) fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
