//! Error types for ProCryptomancer.
//!
//! This module provides the shared error hierarchy using `thiserror`.
//! Cache-specific failures live in `cryptomancer-cache`.

use thiserror::Error;

/// Result type alias using `CryptomancerError`.
pub type Result<T> = std::result::Result<T, CryptomancerError>;

/// Main error type for ProCryptomancer operations.
#[derive(Debug, Error)]
pub enum CryptomancerError {
    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Quote currency code is malformed.
    #[error("Invalid currency code: '{0}'")]
    InvalidCurrency(String),

    /// Page size outside the accepted range.
    #[error("Invalid page size: expected 1..={max}, got {actual}")]
    InvalidPageSize { max: u32, actual: u32 },

    /// Page number must be 1 or greater.
    #[error("Invalid page: {0}")]
    InvalidPage(u32),

    /// Contest submission failed validation.
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // UPSTREAM ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Connection timeout.
    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    /// Upstream answered with a non-success status.
    #[error("Upstream returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// Upstream body did not have the expected shape.
    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIG ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CryptomancerError {
    /// Returns true if this error is recoverable (a later retry may succeed).
    pub fn is_recoverable(&self) -> bool {
        match self {
            CryptomancerError::HttpError(_) | CryptomancerError::ConnectionTimeout(_) => true,
            CryptomancerError::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this is a validation error.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            CryptomancerError::InvalidCurrency(_)
                | CryptomancerError::InvalidPageSize { .. }
                | CryptomancerError::InvalidPage(_)
                | CryptomancerError::InvalidSubmission(_)
        )
    }
}
