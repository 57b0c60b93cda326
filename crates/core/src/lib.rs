//! `mailspool-core` — domain foundation for the email job queue.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the job entity and its status state machine, the validated email message,
//! and the retry decision logic.

pub mod error;
pub mod job;
pub mod message;
pub mod retry;

pub use error::{DomainError, DomainResult};
pub use job::{Job, JobId, JobStatus};
pub use message::EmailMessage;
pub use retry::{RetryDecision, RetryPolicy};
