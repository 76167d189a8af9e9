//! Token issuance and validation.
//!
//! Two token purposes share one HS256 key and are told apart by scope:
//!
//! - `api` - room management and stream key requests
//! - `streaming` - upload session control, handed out as the stream key

pub mod claims;
pub mod tokens;

pub use claims::{AuthUser, Claims, TokenPurpose};
pub use tokens::TokenService;
