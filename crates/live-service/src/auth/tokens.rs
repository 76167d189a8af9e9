//! HS256 token service.
//!
//! # Validation order
//!
//! 1. Size and segment check via `common::jwt` (before any decoding)
//! 2. HS256 signature and `exp`
//! 3. `iat` against the configured clock skew
//! 4. Scope contains the required purpose
//! 5. `sub` parses as a user id
//!
//! Every failure maps to the same generic `InvalidToken` message; the reason
//! is logged at debug level under `live.auth`.

use super::claims::{AuthUser, Claims, TokenPurpose};
use crate::errors::LiveError;
use chrono::Utc;
use common::jwt::{check_token_shape, validate_iat};
use common::secret::{ExposeSecret, SecretString};
use common::types::UserId;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

fn invalid_token() -> LiveError {
    LiveError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
}

/// Issues and verifies purpose-scoped bearer tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock_skew: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &"[REDACTED]")
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &SecretString, clock_skew: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            clock_skew,
        }
    }

    /// Issue a token for `user` scoped to `purpose`, valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `LiveError::Internal` if signing fails.
    pub fn issue(
        &self,
        user: &AuthUser,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<String, LiveError> {
        let now = Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| LiveError::Internal(format!("token ttl out of range: {ttl:?}")))?;

        let claims = Claims {
            sub: user.id.to_string(),
            name: user.name.clone(),
            exp: now.saturating_add(ttl_secs),
            iat: now,
            scope: purpose.scope().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| LiveError::Internal(format!("token signing failed: {e}")))
    }

    /// Verify `token` and check it was issued for `purpose`.
    ///
    /// # Errors
    ///
    /// Returns `LiveError::InvalidToken` with a generic message on any failure.
    #[instrument(skip_all, name = "live.auth.verify", fields(purpose = ?purpose))]
    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<AuthUser, LiveError> {
        check_token_shape(token).map_err(|e| {
            debug!(target: "live.auth", error = ?e, "Token rejected before decoding");
            invalid_token()
        })?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                debug!(target: "live.auth", error = %e, "Token verification failed");
                invalid_token()
            })?
            .claims;

        if let Err(e) = validate_iat(claims.iat, self.clock_skew) {
            debug!(target: "live.auth", error = ?e, "Token iat validation failed");
            return Err(invalid_token());
        }

        if !claims.has_scope(purpose.scope()) {
            debug!(
                target: "live.auth",
                required = purpose.scope(),
                scope = %claims.scope,
                "Token lacks required scope"
            );
            return Err(invalid_token());
        }

        let id: UserId = claims.sub.parse().map_err(|e| {
            debug!(target: "live.auth", error = %e, "Token subject is not a user id");
            invalid_token()
        })?;

        Ok(AuthUser {
            id,
            name: claims.name,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::jwt::DEFAULT_CLOCK_SKEW;

    const SECRET: &str = "unit-test-secret-with-at-least-32-bytes";

    fn service() -> TokenService {
        TokenService::new(&SecretString::from(SECRET), DEFAULT_CLOCK_SKEW)
    }

    fn alice() -> AuthUser {
        AuthUser {
            id: UserId::new(),
            name: "alice".to_string(),
        }
    }

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims_for(user: &AuthUser, scope: &str) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: user.id.to_string(),
            name: user.name.clone(),
            exp: now + 3600,
            iat: now,
            scope: scope.to_string(),
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let service = service();
        let user = alice();

        let token = service
            .issue(&user, TokenPurpose::Api, Duration::from_secs(3600))
            .unwrap();
        let verified = service.verify(&token, TokenPurpose::Api).unwrap();

        assert_eq!(verified, user);
    }

    #[test]
    fn test_wrong_purpose_rejected() {
        let service = service();
        let user = alice();

        let api = service
            .issue(&user, TokenPurpose::Api, Duration::from_secs(3600))
            .unwrap();
        let streaming = service
            .issue(&user, TokenPurpose::Streaming, Duration::from_secs(3600))
            .unwrap();

        assert!(matches!(
            service.verify(&api, TokenPurpose::Streaming),
            Err(LiveError::InvalidToken(_))
        ));
        assert!(matches!(
            service.verify(&streaming, TokenPurpose::Api),
            Err(LiveError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let user = alice();
        let mut claims = claims_for(&user, "api");
        claims.exp = Utc::now().timestamp() - 3600;
        claims.iat = claims.exp - 3600;

        let result = service().verify(&sign(&claims, SECRET), TokenPurpose::Api);

        assert!(matches!(result, Err(LiveError::InvalidToken(_))));
    }

    #[test]
    fn test_future_iat_rejected() {
        let user = alice();
        let mut claims = claims_for(&user, "api");
        claims.iat = Utc::now().timestamp() + 3600;
        claims.exp = claims.iat + 3600;

        let result = service().verify(&sign(&claims, SECRET), TokenPurpose::Api);

        assert!(matches!(result, Err(LiveError::InvalidToken(_))));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let claims = claims_for(&alice(), "api");
        let token = sign(&claims, "some-other-secret-that-is-32-bytes-long");

        assert!(service().verify(&token, TokenPurpose::Api).is_err());
    }

    #[test]
    fn test_tampered_scope_rejected() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let service = service();
        let token = service
            .issue(&alice(), TokenPurpose::Api, Duration::from_secs(3600))
            .unwrap();

        // Swap the payload for one claiming the streaming scope, keep the signature
        let mut parts = token.split('.');
        let header = parts.next().unwrap();
        let payload = parts.next().unwrap();
        let signature = parts.next().unwrap();

        let mut claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        claims["scope"] = serde_json::Value::from("streaming");
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let forged = format!("{header}.{forged_payload}.{signature}");

        assert!(matches!(
            service.verify(&forged, TokenPurpose::Streaming),
            Err(LiveError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let mut claims = claims_for(&alice(), "api");
        claims.sub = "alice@example.com".to_string();

        let result = service().verify(&sign(&claims, SECRET), TokenPurpose::Api);

        assert!(matches!(result, Err(LiveError::InvalidToken(_))));
    }

    #[test]
    fn test_malformed_and_oversized_tokens_rejected() {
        let service = service();

        assert!(service.verify("not-a-jwt", TokenPurpose::Api).is_err());
        let oversized = format!("{}.b.c", "a".repeat(10_000));
        assert!(service.verify(&oversized, TokenPurpose::Api).is_err());
    }

    #[test]
    fn test_error_message_is_generic() {
        let err = service()
            .verify("a.b.c", TokenPurpose::Api)
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            format!("Invalid token: {INVALID_TOKEN_MESSAGE}")
        );
    }

    #[test]
    fn test_debug_hides_keys() {
        let debug = format!("{:?}", service());
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("[REDACTED]"));
    }
}
