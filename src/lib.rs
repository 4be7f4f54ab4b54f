//! Request Throttle - per-key fixed-window request throttling
//!
//! This crate counts requests per client key (source address or tenant)
//! inside fixed time windows and rejects requests past a configured ceiling.
//! State lives in an in-process store that a background sweeper keeps
//! bounded. An axum middleware and a standalone check service put the
//! throttle in front of HTTP handlers.

pub mod config;
pub mod error;
pub mod http;
pub mod throttle;
