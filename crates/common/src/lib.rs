//! Common utilities and types shared across Streamfox components.

#![warn(clippy::pedantic)]

/// Module for identifier types
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, clock skew, iat validation)
pub mod jwt;
