//! Infrastructure layer: job persistence, delivery transport, worker pool.

pub mod jobs;
pub mod mailer;
pub mod workers;


pub use jobs::service::{MailService, ServiceError};
pub use jobs::sqlite::SqliteJobStore;
pub use jobs::store::{InMemoryJobStore, JobStore, JobStoreError};
pub use mailer::{DeliveryError, Mailer, SmtpMailer};
pub use workers::pool::{PoolConfig, WorkerPool, WorkerPoolHandle};
