//! Enqueue/lookup service — the only write path reachable from the front-end.

use std::sync::Arc;

use tracing::debug;

use mailspool_core::{DomainError, EmailMessage, Job, JobId};

use super::store::{JobStore, JobStoreError};

/// Service error surfaced to the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("job not found")]
    NotFound,
    #[error(transparent)]
    Store(JobStoreError),
}

impl From<JobStoreError> for ServiceError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(_) => ServiceError::NotFound,
            other => ServiceError::Store(other),
        }
    }
}

/// Accepts send requests and persists them as pending jobs.
#[derive(Clone)]
pub struct MailService {
    store: Arc<dyn JobStore>,
}

impl MailService {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Validate the payload and persist a pending job.
    ///
    /// Rejected input never touches the store.
    pub async fn enqueue(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<JobId, ServiceError> {
        let message = EmailMessage::new(to, subject, body)?;
        let id = self.store.create(message).await?;
        debug!(job_id = %id, "email job enqueued");
        Ok(id)
    }

    /// Look up a job by id.
    pub async fn get_job(&self, id: JobId) -> Result<Job, ServiceError> {
        match self.store.get(id).await? {
            Some(job) => Ok(job),
            None => Err(ServiceError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::InMemoryJobStore;
    use mailspool_core::JobStatus;

    fn service() -> MailService {
        MailService::new(InMemoryJobStore::arc())
    }

    #[tokio::test]
    async fn enqueue_creates_pending_job() {
        let svc = service();
        let id = svc.enqueue("a@b.com", "hi", "there").await.unwrap();

        let job = svc.get_job(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.to, "a@b.com");
    }

    #[tokio::test]
    async fn enqueue_rejects_whitespace_recipient() {
        let svc = service();
        let err = svc.enqueue(" ", "s", "b").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn enqueue_rejects_oversized_subject() {
        let svc = service();
        let subject = "s".repeat(256);
        let err = svc.enqueue("a@b.com", &subject, "b").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let svc = service();
        let err = svc.get_job(JobId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }
}
