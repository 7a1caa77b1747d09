//! Common traits for ProCryptomancer.
//!
//! These traits define the interfaces that different implementations can satisfy,
//! enabling modularity and testing.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{NewSubmission, PageRequest, PriceQuery, Submission, SubmissionPage};

// ═══════════════════════════════════════════════════════════════════════════════
// MARKET DATA TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface for the external market data provider.
///
/// Implementations might use:
/// - A public REST API (CoinGecko-compatible)
/// - A fixed in-memory snapshot (for testing/development)
///
/// Callers are expected to pass a normalized query. Implementations do
/// not cache; that is the job of the freshness cache in front of them.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches one page of market listings as raw JSON.
    async fn fetch_markets(&self, query: &PriceQuery) -> Result<serde_json::Value>;

    /// Short provider name for logs and diagnostics.
    fn name(&self) -> &str;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUBMISSION STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Storage for contest submissions.
///
/// Implementations validate entries on insert and list them newest first.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Validates and stores an entry, returning it with its id and timestamp.
    async fn insert(&self, submission: NewSubmission) -> Result<Submission>;

    /// Returns one page of entries, newest first, with the overall total.
    async fn list(&self, request: PageRequest) -> Result<SubmissionPage>;
}
