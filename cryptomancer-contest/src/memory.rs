//! In-memory submission store.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use cryptomancer_core::error::Result;
use cryptomancer_core::traits::SubmissionStore;
use cryptomancer_core::types::{NewSubmission, PageRequest, Submission, SubmissionPage};

/// In-memory submission store.
///
/// Entries are kept in insertion order, which is also creation order, so
/// listings walk the vector backwards.
#[derive(Debug)]
pub struct MemorySubmissionStore {
    submissions: RwLock<Vec<Submission>>,
    next_id: AtomicU64,
}

impl MemorySubmissionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            submissions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for MemorySubmissionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    #[instrument(skip(self, submission), fields(username = %submission.username))]
    async fn insert(&self, submission: NewSubmission) -> Result<Submission> {
        submission.validate()?;

        // Id and push under one write lock keep ids in list order.
        let mut submissions = self.submissions.write();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = Submission::from_new(id, submission, Utc::now());
        submissions.push(stored.clone());

        debug!(id, total = submissions.len(), "Stored contest submission");
        Ok(stored)
    }

    async fn list(&self, request: PageRequest) -> Result<SubmissionPage> {
        let submissions = self.submissions.read();
        let items = submissions
            .iter()
            .rev()
            .skip(request.offset())
            .take(request.limit as usize)
            .cloned()
            .collect();

        Ok(SubmissionPage {
            page: request.page,
            limit: request.limit,
            total: submissions.len(),
            items,
        })
    }
}
