//! DTOs for API requests and responses.

use serde::{Deserialize, Serialize};

use cryptomancer_cache::{CacheStats, LookupSource};
use cryptomancer_core::types::{Submission, SubmissionPage};

/// Query string for the prices endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct PricesParams {
    /// Quote currency (default "usd")
    pub currency: Option<String>,
    /// Markets per page (default 20)
    pub limit: Option<u32>,
    /// 1-based page (default 1)
    pub page: Option<u32>,
}

/// Response for the prices endpoint.
#[derive(Debug, Serialize)]
pub struct PricesResponse<'a> {
    /// Normalized quote currency
    pub currency: &'a str,
    /// Markets per page
    pub limit: u32,
    /// Page number
    pub page: u32,
    /// Whether the listing was cached, fetched, or a stale fallback
    pub source: LookupSource,
    /// Age of the listing in milliseconds
    pub age_ms: u64,
    /// Upstream failure masked by a stale listing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_reason: Option<&'a str>,
    /// Upstream listing, passed through untouched
    pub data: &'a serde_json::Value,
}

/// Response for the root liveness probe.
#[derive(Debug, Serialize)]
pub struct RootResponse {
    /// Always true
    pub ok: bool,
}

/// Response for health check.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Market data provider
    pub source: String,
    /// Price cache statistics
    pub cache: CacheStats,
}

/// Static contest descriptor.
#[derive(Debug, Serialize)]
pub struct ContestResponse {
    /// Contest name
    pub name: &'static str,
    /// "open" while submissions are accepted
    pub status: &'static str,
    /// Human-readable rules
    pub rules: &'static str,
    /// Where to list and submit entries
    pub endpoints: ContestEndpoints,
}

/// Contest endpoint paths.
#[derive(Debug, Serialize)]
pub struct ContestEndpoints {
    /// Listing endpoint
    pub list: &'static str,
    /// Submission endpoint
    pub submit: &'static str,
}

/// Query string for the submissions listing.
#[derive(Debug, Default, Deserialize)]
pub struct SubmissionsParams {
    /// Entries per page (default 50, capped at 200)
    pub limit: Option<u32>,
    /// 1-based page (default 1)
    pub page: Option<u32>,
}

/// Response for an accepted submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// Always true
    pub ok: bool,
    /// The stored entry
    pub submission: Submission,
}

/// Response for the submissions listing.
#[derive(Debug, Serialize)]
pub struct SubmissionsResponse {
    /// Always true
    pub ok: bool,
    /// Page, limit, total and items
    #[serde(flatten)]
    pub page: SubmissionPage,
}
