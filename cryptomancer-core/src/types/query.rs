//! Market listing queries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_PAGE, DEFAULT_PER_PAGE, DEFAULT_VS_CURRENCY, MAX_CURRENCY_LEN, MAX_PER_PAGE,
    MIN_CURRENCY_LEN,
};
use crate::error::{CryptomancerError, Result};

/// Parameters of one upstream market listing call.
///
/// Two queries that ask the upstream the same question must produce the
/// same [`cache_key`](Self::cache_key), so every consumer goes through
/// [`normalized`](Self::normalized) before touching the cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceQuery {
    /// Quote currency (e.g. "usd")
    pub vs_currency: String,
    /// Markets per page
    pub per_page: u32,
    /// 1-based page number
    pub page: u32,
}

impl PriceQuery {
    /// Creates a query for the first page.
    pub fn new(vs_currency: impl Into<String>, per_page: u32) -> Self {
        Self {
            vs_currency: vs_currency.into(),
            per_page,
            page: DEFAULT_PAGE,
        }
    }

    /// Sets the page number.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Returns the canonical form of this query, or a validation error.
    pub fn normalized(&self) -> Result<Self> {
        let currency = self.vs_currency.trim().to_ascii_lowercase();

        if currency.len() < MIN_CURRENCY_LEN
            || currency.len() > MAX_CURRENCY_LEN
            || !currency.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(CryptomancerError::InvalidCurrency(self.vs_currency.clone()));
        }

        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(CryptomancerError::InvalidPageSize {
                max: MAX_PER_PAGE,
                actual: self.per_page,
            });
        }

        if self.page == 0 {
            return Err(CryptomancerError::InvalidPage(self.page));
        }

        Ok(Self {
            vs_currency: currency,
            per_page: self.per_page,
            page: self.page,
        })
    }

    /// Canonical cache key, e.g. `"usd:20"` or `"eur:50:p3"`.
    pub fn cache_key(&self) -> Result<String> {
        Ok(self.normalized()?.to_string())
    }
}

impl Default for PriceQuery {
    fn default() -> Self {
        Self::new(DEFAULT_VS_CURRENCY, DEFAULT_PER_PAGE)
    }
}

/// Formats the raw fields in key order; call on a normalized query.
impl fmt::Display for PriceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vs_currency, self.per_page)?;
        if self.page > DEFAULT_PAGE {
            write!(f, ":p{}", self.page)?;
        }
        Ok(())
    }
}
