//! Defaults and validation bounds for ProCryptomancer.

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE QUERIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Quote currency used when a request does not name one.
pub const DEFAULT_VS_CURRENCY: &str = "usd";

/// Number of markets returned per page when a request does not say.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Largest page size the upstream accepts.
pub const MAX_PER_PAGE: u32 = 250;

/// First page (pages are 1-based upstream).
pub const DEFAULT_PAGE: u32 = 1;

/// Shortest accepted quote currency code.
pub const MIN_CURRENCY_LEN: usize = 3;

/// Longest accepted quote currency code.
pub const MAX_CURRENCY_LEN: usize = 10;

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Default freshness window for cached upstream responses.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 60;

/// Default bound on a single upstream fetch.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// CONTEST SUBMISSIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Longest accepted contestant name.
pub const MAX_USERNAME_LEN: usize = 80;

/// Longest accepted wallet address or transaction hash.
pub const MAX_REFERENCE_LEN: usize = 120;

/// Longest accepted free-form note.
pub const MAX_NOTE_LEN: usize = 500;

/// Submissions per page when a request does not say.
pub const DEFAULT_SUBMISSIONS_LIMIT: u32 = 50;

/// Largest submissions page served.
pub const MAX_SUBMISSIONS_LIMIT: u32 = 200;

// ═══════════════════════════════════════════════════════════════════════════════
// UPSTREAM & SERVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Public market data API base URL.
pub const DEFAULT_MARKET_API_URL: &str = "https://api.coingecko.com/api/v3";

/// HTTP client timeout for the market data API.
pub const DEFAULT_MARKET_TIMEOUT_SECONDS: u64 = 8;

/// Port the API server listens on unless `PORT` says otherwise.
pub const DEFAULT_PORT: u16 = 10000;
