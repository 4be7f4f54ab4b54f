//! axum middleware and rejection responses.

use axum::extract::{Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::throttle::{Decision, Quota, RateLimitExceeded, RequestThrottle, ThrottleRequest};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// JSON body of a 429 response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectionBody {
    error: &'static str,
    message: String,
    retry_after: u64,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let body = RejectionBody {
            error: "Too many requests",
            message: self.to_string(),
            retry_after: self.retry_after_secs,
        };

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(RETRY_AFTER, HeaderValue::from(self.retry_after_secs));
        apply_quota_headers(headers, &self.quota);
        response
    }
}

/// Set the `X-RateLimit-*` headers for `quota`.
pub fn apply_quota_headers(headers: &mut HeaderMap, quota: &Quota) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(quota.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(quota.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(quota.reset_epoch_secs));
}

/// Log a rejection the way every caller should.
pub(crate) fn log_rejection(exceeded: &RateLimitExceeded, path: &str) {
    warn!(
        key = %exceeded.key,
        count = exceeded.count,
        max_requests = exceeded.quota.limit,
        path = %path,
        "Rate limit exceeded"
    );
}

/// Throttle every request passing through the wrapped routes.
///
/// Use with `axum::middleware::from_fn_with_state(throttle, throttle_middleware)`.
pub async fn throttle_middleware(
    State(throttle): State<RequestThrottle>,
    request: Request,
    next: Next,
) -> Response {
    let decision = throttle.check(&ThrottleRequest::from_http(&request));

    match decision {
        Decision::Allow(quota) => {
            let mut response = next.run(request).await;
            apply_quota_headers(response.headers_mut(), &quota);
            response
        }
        Decision::Reject(exceeded) => {
            log_rejection(&exceeded, request.uri().path());
            exceeded.into_response()
        }
    }
}

/// Run each request inside a span tagged with its request id.
///
/// Reuses an incoming `x-request-id` and generates one otherwise.
pub async fn request_span(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
