//! Throttle service routes.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde_json::json;
use tracing::{debug, info};

use super::middleware::{apply_quota_headers, log_rejection, request_span};
use crate::config::ThrottlingConfig;
use crate::throttle::{
    Clock, Decision, EntrySnapshot, RequestThrottle, ThrottleRequest, ThrottleStore,
};

/// Shared state behind the service routes.
#[derive(Clone)]
pub struct ServiceState {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    profiles: BTreeMap<String, RequestThrottle>,
    store: Arc<ThrottleStore>,
    clock: Arc<dyn Clock>,
}

impl ServiceState {
    /// Build one throttle per configured profile, all over `store`.
    pub fn from_config(
        config: &ThrottlingConfig,
        store: Arc<ThrottleStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let profiles = config
            .profiles
            .iter()
            .map(|(name, profile)| {
                info!(
                    profile = %name,
                    max_requests = profile.max_requests,
                    window_ms = profile.window_ms,
                    key = ?profile.key,
                    "Registering throttle profile"
                );
                let throttle =
                    RequestThrottle::new(profile.throttle_config(), profile.key, store.clone())
                        .with_clock(clock.clone());
                (name.clone(), throttle)
            })
            .collect();

        Self::new(profiles, store, clock)
    }

    pub fn new(
        profiles: BTreeMap<String, RequestThrottle>,
        store: Arc<ThrottleStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                profiles,
                store,
                clock,
            }),
        }
    }

    pub fn profile(&self, name: &str) -> Option<&RequestThrottle> {
        self.inner.profiles.get(name)
    }

    pub fn store(&self) -> &Arc<ThrottleStore> {
        &self.inner.store
    }

    fn snapshot(&self, key: &str) -> Option<EntrySnapshot> {
        self.inner.store.snapshot(key, self.inner.clock.now_millis())
    }
}

/// Build the service router.
pub fn router(state: ServiceState) -> Router {
    Router::new()
        .route("/check/{profile}", get(check).post(check))
        .route("/entries/{key}", get(entry))
        .route("/healthz", get(health))
        .layer(middleware::from_fn(request_span))
        .with_state(state)
}

fn not_found(message: String) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found", "message": message })),
    )
        .into_response()
}

/// Forward-auth style check of the incoming request against a profile.
async fn check(
    State(state): State<ServiceState>,
    Path(profile): Path<String>,
    request: Request,
) -> Response {
    let Some(throttle) = state.profile(&profile) else {
        debug!(profile = %profile, "Unknown throttle profile");
        return not_found(format!("unknown throttle profile '{}'", profile));
    };

    let throttle_request = ThrottleRequest::from_http(&request);
    match throttle.check(&throttle_request) {
        Decision::Allow(quota) => {
            let mut response = StatusCode::NO_CONTENT.into_response();
            apply_quota_headers(response.headers_mut(), &quota);
            response
        }
        Decision::Reject(exceeded) => {
            log_rejection(&exceeded, throttle_request.path);
            exceeded.into_response()
        }
    }
}

async fn entry(State(state): State<ServiceState>, Path(key): Path<String>) -> Response {
    match state.snapshot(&key) {
        Some(snapshot) => Json(snapshot).into_response(),
        None => not_found(format!("no active entry for '{}'", key)),
    }
}

async fn health(State(state): State<ServiceState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "entries": state.store().len() }))
}
