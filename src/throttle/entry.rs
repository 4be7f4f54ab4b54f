//! Fixed-window counter entry.

use serde::Serialize;
use std::time::Duration;

/// Request count for one key inside its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleEntry {
    /// Requests observed in the current window
    pub count: u64,
    /// Epoch milliseconds at which the window expires
    pub window_reset_at: u64,
}

impl ThrottleEntry {
    /// Start a fresh window at `now`.
    pub fn fresh(now: u64, window: Duration) -> Self {
        Self {
            count: 0,
            window_reset_at: now.saturating_add(window_millis(window)),
        }
    }

    /// Whether the window has run out at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.window_reset_at
    }

    /// Record one request and return the new count.
    pub fn record_hit(&mut self) -> u64 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Milliseconds left in the window, zero once expired.
    pub fn millis_until_reset(&self, now: u64) -> u64 {
        self.window_reset_at.saturating_sub(now)
    }

    /// Whole seconds a rejected client should wait, rounded up.
    pub fn retry_after_secs(&self, now: u64) -> u64 {
        ceil_div(self.millis_until_reset(now), 1000)
    }

    /// Window expiry in epoch seconds, rounded up.
    pub fn reset_epoch_secs(&self) -> u64 {
        ceil_div(self.window_reset_at, 1000)
    }

    /// Remaining quota under `limit`.
    pub fn remaining(&self, limit: u64) -> u64 {
        limit.saturating_sub(self.count)
    }
}

/// Read-only view of an active entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySnapshot {
    pub key: String,
    pub count: u64,
    pub window_reset_at: u64,
    pub remaining_ms: u64,
}

impl EntrySnapshot {
    pub(crate) fn new(key: &str, entry: &ThrottleEntry, now: u64) -> Self {
        Self {
            key: key.to_string(),
            count: entry.count,
            window_reset_at: entry.window_reset_at,
            remaining_ms: entry.millis_until_reset(now),
        }
    }
}

fn window_millis(window: Duration) -> u64 {
    u64::try_from(window.as_millis()).unwrap_or(u64::MAX)
}

fn ceil_div(value: u64, divisor: u64) -> u64 {
    value / divisor + u64::from(value % divisor != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_entry_resets_one_window_later() {
        let entry = ThrottleEntry::fresh(1_000, Duration::from_secs(60));
        assert_eq!(entry.count, 0);
        assert_eq!(entry.window_reset_at, 61_000);
    }

    #[test]
    fn test_expiry_is_inclusive_of_reset_instant() {
        let entry = ThrottleEntry::fresh(0, Duration::from_millis(100));
        assert!(!entry.is_expired(99));
        assert!(entry.is_expired(100));
        assert!(entry.is_expired(101));
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let entry = ThrottleEntry::fresh(0, Duration::from_secs(60));
        assert_eq!(entry.retry_after_secs(3), 60);
        assert_eq!(entry.retry_after_secs(59_000), 1);
        assert_eq!(entry.retry_after_secs(59_001), 1);
        assert_eq!(entry.retry_after_secs(60_000), 0);
    }

    #[test]
    fn test_reset_epoch_secs_rounds_up() {
        let entry = ThrottleEntry::fresh(1_700_000_000_250, Duration::from_secs(60));
        assert_eq!(entry.reset_epoch_secs(), 1_700_000_061);
    }

    #[test]
    fn test_remaining_saturates_at_zero() {
        let mut entry = ThrottleEntry::fresh(0, Duration::from_secs(1));
        for _ in 0..4 {
            entry.record_hit();
        }
        assert_eq!(entry.remaining(5), 1);
        assert_eq!(entry.remaining(3), 0);
    }
}
