//! HTTP surface for request throttling.

mod middleware;
mod server;
mod service;

pub use middleware::{
    apply_quota_headers, request_span, throttle_middleware, X_RATELIMIT_LIMIT,
    X_RATELIMIT_REMAINING, X_RATELIMIT_RESET, X_REQUEST_ID,
};
pub use server::ThrottleServer;
pub use service::{router, ServiceState};
