//! Live Service Library
//!
//! Signaling and session-management core of the Streamfox live streaming
//! platform:
//!
//! - Live room registry with discovery ranking
//! - Upload session negotiation with one session per streaming identity
//! - Purpose-scoped bearer tokens (`api` / `streaming`)
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> rooms/ , upload/ -> transport/
//! ```
//!
//! # Modules
//!
//! - `auth` - Token issuance and validation
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and metrics middleware
//! - `models` - Request and response bodies
//! - `observability` - Metric definitions
//! - `rooms` - Live rooms and the room registry
//! - `routes` - Axum router setup
//! - `transport` - Negotiation transport boundary and WebRTC adapter
//! - `upload` - Upload session state machine and registry

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod rooms;
pub mod routes;
pub mod transport;
pub mod upload;
