//! Shared key to entry map.

use dashmap::DashMap;
use std::time::Duration;
use tracing::debug;

use super::entry::{EntrySnapshot, ThrottleEntry};

/// Process-wide throttle state, shared by every throttle and the sweeper.
///
/// Keys live in a sharded map. A hit holds the shard lock for its key from
/// lookup through increment, so concurrent hits on one key never interleave.
#[derive(Debug, Default)]
pub struct ThrottleStore {
    entries: DashMap<String, ThrottleEntry>,
}

impl ThrottleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Count one request for `key` at `now`.
    ///
    /// Starts a fresh window when the key is unknown or its window has
    /// expired. Returns the entry as it stands after the increment.
    pub fn hit(&self, key: &str, now: u64, window: Duration) -> ThrottleEntry {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(key = %key, "Creating throttle entry");
                ThrottleEntry::fresh(now, window)
            });

        if entry.is_expired(now) {
            *entry = ThrottleEntry::fresh(now, window);
        }

        entry.record_hit();
        *entry
    }

    /// Get the stored entry for `key`, expired or not.
    pub fn get(&self, key: &str) -> Option<ThrottleEntry> {
        self.entries.get(key).map(|entry| *entry)
    }

    /// Snapshot of the entry for `key` if its window is still active at `now`.
    pub fn snapshot(&self, key: &str, now: u64) -> Option<EntrySnapshot> {
        self.get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| EntrySnapshot::new(key, &entry, now))
    }

    /// Remove every entry whose window has expired at `now`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now: u64) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
