//! # ProCryptomancer Contest
//!
//! Storage for contest submissions.
//!
//! - **Memory**: process-local storage; entries are lost on restart
//!
//! ## Example
//!
//! ```rust,ignore
//! use cryptomancer_contest::{MemorySubmissionStore, SubmissionStore};
//! use cryptomancer_core::types::{NewSubmission, PageRequest};
//!
//! let store = MemorySubmissionStore::new();
//! let stored = store.insert(NewSubmission::new("satoshi")).await?;
//! let page = store.list(PageRequest::default()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod memory;

pub use memory::MemorySubmissionStore;

// Re-export the trait from core
pub use cryptomancer_core::traits::SubmissionStore;
