//! Domain types for ProCryptomancer.
//!
//! - [`PriceQuery`]: parameters of an upstream market listing and its cache key
//! - [`NewSubmission`], [`Submission`]: contest entries
//! - [`PageRequest`], [`SubmissionPage`]: paginated submission listings

mod contest;
mod query;

pub use contest::*;
pub use query::*;
