//! JWT claims and the authenticated identity derived from them.

use crate::rooms::UserInfo;
use common::types::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenPurpose {
    /// Regular API access.
    Api,
    /// Upload session control.
    Streaming,
}

impl TokenPurpose {
    /// Scope string carried in the token.
    #[must_use]
    pub fn scope(self) -> &'static str {
        match self {
            TokenPurpose::Api => "api",
            TokenPurpose::Streaming => "streaming",
        }
    }
}

/// JWT claims issued by [`TokenService`](super::TokenService).
///
/// `sub` is redacted in Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,

    /// Display name.
    pub name: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Space-separated scopes.
    pub scope: String,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("name", &self.name)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Claims {
    /// Check if the token has a specific scope.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

/// Authenticated caller, inserted into request extensions by the auth
/// middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub name: String,
}

impl From<AuthUser> for UserInfo {
    fn from(user: AuthUser) -> Self {
        UserInfo {
            id: user.id,
            name: user.name,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn claims(scope: &str) -> Claims {
        Claims {
            sub: "0190b7a0-0000-7000-8000-000000000000".to_string(),
            name: "alice".to_string(),
            exp: 1_700_003_600,
            iat: 1_700_000_000,
            scope: scope.to_string(),
        }
    }

    #[test]
    fn test_claims_debug_redacts_sub() {
        let debug_str = format!("{:?}", claims("api"));

        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("0190b7a0"));
        assert!(debug_str.contains("alice"));
    }

    #[test]
    fn test_has_scope() {
        let both = claims("api streaming");

        assert!(both.has_scope("api"));
        assert!(both.has_scope("streaming"));
        assert!(!both.has_scope("admin"));
        assert!(!claims("apistreaming").has_scope("api"));
    }

    #[test]
    fn test_purpose_scopes() {
        assert_eq!(TokenPurpose::Api.scope(), "api");
        assert_eq!(TokenPurpose::Streaming.scope(), "streaming");
    }

    #[test]
    fn test_auth_user_into_user_info() {
        let id = UserId::new();
        let info: UserInfo = AuthUser {
            id,
            name: "alice".to_string(),
        }
        .into();

        assert_eq!(info.id, id);
        assert_eq!(info.name, "alice");
    }
}
