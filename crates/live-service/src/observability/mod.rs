//! Observability for the live service.
//!
//! Provides metric definitions and recording helpers.

pub mod metrics;
