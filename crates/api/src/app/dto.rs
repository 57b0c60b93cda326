use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mailspool_core::{Job, JobId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: JobId,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub status: String,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            to: job.to,
            subject: job.subject,
            body: job.body,
            status: job.status.as_str().to_string(),
            attempts: job.attempts,
            error_message: job.error_message,
            created_at: job.created_at,
            sent_at: job.sent_at,
        }
    }
}
