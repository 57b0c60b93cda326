//! The email job entity and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::EmailMessage;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Job delivery status.
///
/// The lifecycle is a strict one-way walk:
///
/// ```text
/// pending -> processing -> sent
///                       -> failed
/// ```
///
/// There is no transition out of `processing` other than the two terminal
/// finalizations. A delivery failure that still has retry budget left bumps
/// the attempt counter but does not move the job back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Queued, waiting to be claimed by a worker.
    Pending,
    /// Claimed by a worker, delivery in flight (or parked after a retryable failure).
    Processing,
    /// Delivered successfully.
    Sent,
    /// Given up after exhausting the retry budget.
    Failed,
}

impl JobStatus {
    /// Terminal statuses are never mutated again by the store.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Sent | JobStatus::Failed)
    }

    /// The literal name persisted in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Sent => "sent",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "sent" => Ok(JobStatus::Sent),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound email request tracked through its delivery lifecycle.
///
/// The payload (`to`, `subject`, `body`) and `created_at` are immutable after
/// creation; only the store mutates `status`, `attempts`, `error_message` and
/// `sent_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a fresh pending job from a validated message.
    pub fn new(message: EmailMessage) -> Self {
        let (to, subject, body) = message.into_parts();
        Self {
            id: JobId::new(),
            to,
            subject,
            body,
            status: JobStatus::Pending,
            attempts: 0,
            error_message: None,
            created_at: Utc::now(),
            sent_at: None,
        }
    }
}
