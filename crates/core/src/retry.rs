//! Retry decision logic.

use serde::{Deserialize, Serialize};

/// Outcome of consulting the retry policy after a failed delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Budget remains; record the attempt and leave the job claimable-state as-is.
    Retry { attempts: u32 },
    /// Budget exhausted; finalize the job as failed.
    GiveUp,
}

/// Fixed attempt budget shared by the whole worker pool.
///
/// Pure decision function, no side effects: given the attempts recorded so
/// far and one fresh failure, the failed attempt is number `attempts + 1`;
/// reaching `max_retries` makes the failure terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Decide what to do about a delivery failure for a job that has already
    /// recorded `attempts` failed attempts.
    pub fn on_failure(&self, attempts: u32) -> RetryDecision {
        let attempts = attempts + 1;
        if attempts >= self.max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry { attempts }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}
