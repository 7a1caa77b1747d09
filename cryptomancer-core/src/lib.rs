//! # ProCryptomancer Core
//!
//! Core types, errors, and traits shared by every ProCryptomancer crate:
//!
//! - **Types**: price queries and their cache keys, contest submissions
//! - **Errors**: the common error hierarchy
//! - **Constants**: defaults and validation bounds
//! - **Traits**: the market data source and submission store seams
//!
//! ## Example
//!
//! ```rust
//! use cryptomancer_core::PriceQuery;
//!
//! let key = PriceQuery::new(" USD ", 20).cache_key().unwrap();
//! assert_eq!(key, "usd:20");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{CryptomancerError, Result};
pub use traits::*;
pub use types::*;
