//! Outcome of a throttle check.

use std::time::Duration;
use thiserror::Error;

use super::entry::ThrottleEntry;

/// Quota metadata reported with every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Maximum requests per window
    pub limit: u64,
    /// Requests left in the current window
    pub remaining: u64,
    /// Window expiry in epoch seconds
    pub reset_epoch_secs: u64,
}

impl Quota {
    pub(crate) fn from_entry(entry: &ThrottleEntry, limit: u64) -> Self {
        Self {
            limit,
            remaining: entry.remaining(limit),
            reset_epoch_secs: entry.reset_epoch_secs(),
        }
    }
}

/// The single condition a throttle can signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Rate limit exceeded. Maximum {} requests per {} seconds.", .quota.limit, .window.as_secs_f64())]
pub struct RateLimitExceeded {
    /// Key that went over its limit
    pub key: String,
    /// Count observed in the current window, including this request
    pub count: u64,
    /// Seconds until the window resets
    pub retry_after_secs: u64,
    /// Limit metadata; `remaining` is always 0
    pub quota: Quota,
    /// Configured window duration
    pub window: Duration,
}

/// Whether a request may proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(Quota),
    Reject(RateLimitExceeded),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    /// Quota metadata, whichever way the decision went.
    pub fn quota(&self) -> &Quota {
        match self {
            Decision::Allow(quota) => quota,
            Decision::Reject(exceeded) => &exceeded.quota,
        }
    }

    /// Convert into a `Result` so callers can use `?`.
    pub fn into_result(self) -> Result<Quota, RateLimitExceeded> {
        match self {
            Decision::Allow(quota) => Ok(quota),
            Decision::Reject(exceeded) => Err(exceeded),
        }
    }
}
