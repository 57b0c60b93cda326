//! Job store abstraction and the in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use mailspool_core::{EmailMessage, Job, JobId, JobStatus};

/// Sole authority over job persistence and state transitions.
///
/// All mutations must be atomic with respect to concurrent callers; in
/// particular [`claim_batch`](JobStore::claim_batch) is a single
/// read-modify-return unit, so two concurrent claims never select the same
/// job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new pending job with zero attempts. Never partially writes.
    async fn create(&self, message: EmailMessage) -> Result<JobId, JobStoreError>;

    /// Fetch a job by id. `Ok(None)` when no such row exists.
    async fn get(&self, id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Atomically select up to `limit` pending jobs, oldest first, transition
    /// them to `processing` and return the post-transition snapshots.
    ///
    /// Returns an empty vec (not an error) when nothing is pending, and does
    /// not block waiting for work.
    async fn claim_batch(&self, limit: u32) -> Result<Vec<Job>, JobStoreError>;

    /// Terminal transition to `sent`; sets `sent_at` on the first call and is
    /// idempotent thereafter. Prior status is not validated.
    async fn mark_sent(&self, id: JobId) -> Result<(), JobStoreError>;

    /// Bump the stored attempt counter by one. Status is untouched.
    async fn increment_attempts(&self, id: JobId) -> Result<(), JobStoreError>;

    /// Terminal transition to `failed`, recording the delivery error.
    /// The attempt counter is untouched.
    async fn mark_failed(&self, id: JobId, error_message: &str) -> Result<(), JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, message: EmailMessage) -> Result<JobId, JobStoreError> {
        let job = Job::new(message);
        let id = job.id;
        self.jobs.write().unwrap().insert(id, job);
        Ok(id)
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        Ok(self.jobs.read().unwrap().get(&id).cloned())
    }

    async fn claim_batch(&self, limit: u32) -> Result<Vec<Job>, JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();

        // Oldest pending first for FIFO fairness.
        let mut candidates: Vec<_> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .map(|j| (j.created_at, j.id))
            .collect();
        candidates.sort_by_key(|&(created_at, _)| created_at);
        candidates.truncate(limit as usize);

        let mut claimed = Vec::with_capacity(candidates.len());
        for (_, id) in candidates {
            if let Some(job) = jobs.get_mut(&id) {
                job.status = JobStatus::Processing;
                claimed.push(job.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_sent(&self, id: JobId) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.status = JobStatus::Sent;
        if job.sent_at.is_none() {
            job.sent_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn increment_attempts(&self, id: JobId) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.attempts += 1;
        Ok(())
    }

    async fn mark_failed(&self, id: JobId, error_message: &str) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.status = JobStatus::Failed;
        job.error_message = Some(error_message.to_string());
        Ok(())
    }
}
