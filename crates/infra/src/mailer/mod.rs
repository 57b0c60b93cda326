//! Delivery transport capability.

pub mod smtp;

use async_trait::async_trait;

pub use smtp::{SmtpConfig, SmtpMailer};

/// Delivery failure.
///
/// The variants only matter for diagnostics; the retry policy treats every
/// failure identically.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("smtp i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("smtp rejected: {0}")]
    Rejected(String),
}

/// The external capability that actually sends an email.
///
/// Opaque to the core: possibly slow, possibly failing. No per-call timeout
/// is imposed here; deadline behavior is the transport's own business.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, to: &str, subject: &str, body: &str) -> Result<(), DeliveryError>;
}
