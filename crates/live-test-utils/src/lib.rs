//! # Live Test Utilities
//!
//! Shared test utilities for the live service.
//!
//! This crate provides:
//! - Server test harness (`TestLiveServer` for E2E tests)
//! - Token builders (`TestTokenBuilder` for hand-crafted JWTs)
//! - Re-export of `MockTransport` for scripting upload negotiations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use live_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestLiveServer::spawn().await?;
//!     let client = reqwest::Client::new();
//!
//!     let response = client
//!         .get(format!("{}/live/rooms", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use live_service::transport::MockTransport;
pub use server_harness::*;
pub use token_builders::*;
