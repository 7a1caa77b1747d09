//! Cache failures surfaced to callers.

use std::fmt::Display;

use thiserror::Error;

use cryptomancer_core::error::CryptomancerError;

/// Failure of a cache lookup.
///
/// Cloneable because a single fetch outcome is delivered to every caller
/// waiting on the same key.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The fetcher failed and no usable value exists.
    #[error("Upstream unavailable for '{key}': {reason}")]
    UpstreamUnavailable { key: String, reason: String },

    /// The fetch ran out of time and no usable value exists, either at the
    /// cache's fetch bound or at the fetcher's own timeout.
    #[error("Upstream timed out for '{key}': {reason}")]
    UpstreamTimeout { key: String, reason: String },
}

impl CacheError {
    /// The cache key the failed lookup was for.
    pub fn key(&self) -> &str {
        match self {
            CacheError::UpstreamUnavailable { key, .. } | CacheError::UpstreamTimeout { key, .. } => key,
        }
    }

    /// Returns true if the fetch ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CacheError::UpstreamTimeout { .. })
    }
}

/// Error a fetcher may fail with.
///
/// A failure that reports [`is_timeout`](FetchFailure::is_timeout) becomes
/// [`CacheError::UpstreamTimeout`]; anything else becomes
/// [`CacheError::UpstreamUnavailable`].
pub trait FetchFailure: Display {
    /// Returns true if the fetcher gave up waiting on the upstream.
    fn is_timeout(&self) -> bool {
        false
    }
}

impl FetchFailure for String {}

impl FetchFailure for &'static str {}

impl FetchFailure for CryptomancerError {
    fn is_timeout(&self) -> bool {
        matches!(self, CryptomancerError::ConnectionTimeout(_))
    }
}
