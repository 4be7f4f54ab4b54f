//! Fixed-window request throttling and state management.

mod clock;
mod decision;
mod entry;
mod key;
mod limiter;
mod store;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{Decision, Quota, RateLimitExceeded};
pub use entry::{EntrySnapshot, ThrottleEntry};
pub use key::{KeyExtractor, KeyStrategy, ThrottleRequest};
pub use limiter::{
    RequestThrottle, ThrottleConfig, DEFAULT_IP_MAX_REQUESTS, DEFAULT_LIST_MAX_REQUESTS,
    DEFAULT_TENANT_MAX_REQUESTS, DEFAULT_WINDOW,
};
pub use store::ThrottleStore;
pub use sweeper::{Sweeper, SweeperHandle, DEFAULT_SWEEP_INTERVAL};
