//! Core request throttle implementation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::decision::{Decision, Quota, RateLimitExceeded};
use super::entry::EntrySnapshot;
use super::key::{KeyExtractor, KeyStrategy, ThrottleRequest};
use super::store::ThrottleStore;

/// Default window duration.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Default limit for throttles keyed by client address.
pub const DEFAULT_IP_MAX_REQUESTS: u64 = 100;
/// Default limit for throttles keyed by tenant.
pub const DEFAULT_TENANT_MAX_REQUESTS: u64 = 200;
/// Default per-address limit for authenticated list and detail endpoints.
pub const DEFAULT_LIST_MAX_REQUESTS: u64 = 200;

/// Limit settings for one throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Length of each fixed window
    pub window: Duration,
    /// Requests allowed per window
    pub max_requests: u64,
}

impl ThrottleConfig {
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

/// A fixed-window request throttle.
///
/// Counts requests per derived key and rejects every request past
/// `max_requests` until the key's window expires. A client can spend a full
/// quota at the end of one window and another right after the reset; the
/// fixed window accepts that burst.
///
/// Cloning is cheap and clones share the same store.
#[derive(Clone)]
pub struct RequestThrottle {
    config: ThrottleConfig,
    key_extractor: Arc<dyn KeyExtractor>,
    store: Arc<ThrottleStore>,
    clock: Arc<dyn Clock>,
}

impl RequestThrottle {
    /// Create a throttle over a shared store using the system clock.
    pub fn new<K>(config: ThrottleConfig, key_extractor: K, store: Arc<ThrottleStore>) -> Self
    where
        K: KeyExtractor + 'static,
    {
        Self {
            config,
            key_extractor: Arc::new(key_extractor),
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Throttle keyed by client address.
    pub fn by_ip(max_requests: u64, window: Duration, store: Arc<ThrottleStore>) -> Self {
        Self::new(ThrottleConfig::new(max_requests, window), KeyStrategy::Ip, store)
    }

    /// Throttle keyed by tenant identifier.
    pub fn by_tenant(max_requests: u64, window: Duration, store: Arc<ThrottleStore>) -> Self {
        Self::new(
            ThrottleConfig::new(max_requests, window),
            KeyStrategy::Tenant,
            store,
        )
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Decide whether `request` may proceed, counting it against its key.
    pub fn check(&self, request: &ThrottleRequest<'_>) -> Decision {
        let key = self.key_extractor.extract(request);

        trace!(key = %key, path = %request.path, "Checking request throttle");

        self.check_key(&key)
    }

    /// Decide for a key the caller already derived.
    pub fn check_key(&self, key: &str) -> Decision {
        let now = self.clock.now_millis();
        let entry = self.store.hit(key, now, self.config.window);
        let quota = Quota::from_entry(&entry, self.config.max_requests);

        if entry.count > self.config.max_requests {
            debug!(
                key = %key,
                count = entry.count,
                limit = self.config.max_requests,
                "Throttle limit exceeded"
            );
            return Decision::Reject(RateLimitExceeded {
                key: key.to_string(),
                count: entry.count,
                retry_after_secs: entry.retry_after_secs(now),
                quota,
                window: self.config.window,
            });
        }

        Decision::Allow(quota)
    }

    /// Snapshot of the key's entry while its window is active.
    pub fn inspect(&self, key: &str) -> Option<EntrySnapshot> {
        self.store.snapshot(key, self.clock.now_millis())
    }

    /// Derive the key for a request without counting it.
    pub fn key_for(&self, request: &ThrottleRequest<'_>) -> String {
        self.key_extractor.extract(request)
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ThrottleStore> {
        &self.store
    }
}

impl fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("config", &self.config)
            .field("entries", &self.store.len())
            .finish_non_exhaustive()
    }
}
