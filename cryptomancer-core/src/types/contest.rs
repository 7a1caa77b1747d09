//! Contest submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_PAGE, DEFAULT_SUBMISSIONS_LIMIT, MAX_NOTE_LEN, MAX_REFERENCE_LEN,
    MAX_SUBMISSIONS_LIMIT, MAX_USERNAME_LEN,
};
use crate::error::{CryptomancerError, Result};

/// A contest entry as posted by a contestant.
///
/// Unknown fields are ignored. `pnl` and `score` default to 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    /// Contestant name (required, at most 80 characters)
    pub username: String,
    /// Wallet address
    #[serde(default)]
    pub wallet: Option<String>,
    /// Reported profit and loss
    #[serde(default)]
    pub pnl: f64,
    /// Reported score
    #[serde(default)]
    pub score: f64,
    /// Transaction backing the entry
    #[serde(default)]
    pub tx_hash: Option<String>,
    /// Free-form note
    #[serde(default)]
    pub note: Option<String>,
}

impl NewSubmission {
    /// Creates a submission with only a username.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            wallet: None,
            pnl: 0.0,
            score: 0.0,
            tx_hash: None,
            note: None,
        }
    }

    /// Validates field lengths.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(CryptomancerError::InvalidSubmission(
                "username is required".into(),
            ));
        }
        check_len("username", Some(&self.username), MAX_USERNAME_LEN)?;
        check_len("wallet", self.wallet.as_deref(), MAX_REFERENCE_LEN)?;
        check_len("txHash", self.tx_hash.as_deref(), MAX_REFERENCE_LEN)?;
        check_len("note", self.note.as_deref(), MAX_NOTE_LEN)?;

        if !self.pnl.is_finite() || !self.score.is_finite() {
            return Err(CryptomancerError::InvalidSubmission(
                "pnl and score must be finite numbers".into(),
            ));
        }

        Ok(())
    }
}

fn check_len(field: &str, value: Option<&str>, max: usize) -> Result<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(CryptomancerError::InvalidSubmission(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

/// A stored contest entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Store-assigned identifier
    pub id: u64,
    /// Contestant name
    pub username: String,
    /// Wallet address
    pub wallet: Option<String>,
    /// Reported profit and loss
    pub pnl: f64,
    /// Reported score
    pub score: f64,
    /// Transaction backing the entry
    pub tx_hash: Option<String>,
    /// Free-form note
    pub note: Option<String>,
    /// When the entry was accepted
    pub created_at: DateTime<Utc>,
}

impl Submission {
    /// Stores a validated entry under `id`.
    pub fn from_new(id: u64, new: NewSubmission, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            username: new.username,
            wallet: new.wallet,
            pnl: new.pnl,
            score: new.score,
            tx_hash: new.tx_hash,
            note: new.note,
            created_at,
        }
    }
}

/// Which slice of the submissions to list, newest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u32,
    /// Entries per page, 1..=200
    pub limit: u32,
}

impl PageRequest {
    /// Fills in defaults and clamps out-of-range values.
    ///
    /// `limit` defaults to 50 and is clamped to 1..=200; `page` defaults
    /// to 1 and is raised to at least 1.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).max(1),
            limit: limit
                .unwrap_or(DEFAULT_SUBMISSIONS_LIMIT)
                .clamp(1, MAX_SUBMISSIONS_LIMIT),
        }
    }

    /// Number of entries before this page.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.limit as usize)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of submissions.
#[derive(Clone, Debug, Serialize)]
pub struct SubmissionPage {
    /// Page served
    pub page: u32,
    /// Page size applied
    pub limit: u32,
    /// Submissions across all pages
    pub total: usize,
    /// Entries on this page, newest first
    pub items: Vec<Submission>,
}
