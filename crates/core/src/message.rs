//! Validated email message value object.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Longest accepted subject, in characters.
pub const MAX_SUBJECT_CHARS: usize = 255;

/// Largest accepted body, in characters.
pub const MAX_BODY_CHARS: usize = 100_000;

/// An outbound email payload that has passed input validation.
///
/// Construction trims surrounding whitespace from all three fields and is the
/// only way to obtain an instance, so holding an `EmailMessage` means the
/// payload is within bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    to: String,
    subject: String,
    body: String,
}

impl EmailMessage {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> DomainResult<Self> {
        let to = to.into().trim().to_string();
        let subject = subject.into().trim().to_string();
        let body = body.into().trim().to_string();

        if to.is_empty() || subject.is_empty() || body.is_empty() {
            return Err(DomainError::validation("to, subject and body are required"));
        }
        if subject.chars().count() > MAX_SUBJECT_CHARS {
            return Err(DomainError::validation(format!(
                "subject exceeds {MAX_SUBJECT_CHARS} characters"
            )));
        }
        if body.chars().count() > MAX_BODY_CHARS {
            return Err(DomainError::validation(format!(
                "body exceeds {MAX_BODY_CHARS} characters"
            )));
        }

        Ok(Self { to, subject, body })
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_parts(self) -> (String, String, String) {
        (self.to, self.subject, self.body)
    }
}
