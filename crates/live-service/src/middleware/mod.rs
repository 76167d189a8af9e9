//! HTTP middleware for the live service.
//!
//! # Components
//!
//! - `auth` - Bearer token middleware for API and streaming routes
//! - `http_metrics` - HTTP request metrics middleware

pub mod auth;
pub mod http_metrics;

pub use auth::{require_api_auth, require_streaming_auth};
pub use http_metrics::http_metrics_middleware;
