//! Freshness-bounded cache for expensive upstream lookups.
//!
//! Each key holds the last successful value and its fetch time. A stale or
//! missing key triggers exactly one upstream fetch no matter how many
//! callers ask for it concurrently; every waiter receives that fetch's
//! outcome.

mod cache;
mod config;
mod error;

pub use cache::{CacheStats, FreshnessCache, Lookup, LookupSource};
pub use config::{CacheConfig, StalePolicy};
pub use error::{CacheError, FetchFailure};
