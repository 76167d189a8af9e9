//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] types. Use them for the token signing key and for
//! any bearer token held longer than a single request.
//!
//! `SecretString` implements `Debug` with redaction, so a struct deriving
//! `Debug` that contains one logs safely. The value is zeroized on drop and
//! can only be read through [`ExposeSecret::expose_secret`].
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct SigningConfig {
//!     issuer: String,
//!     key: SecretString,
//! }
//!
//! let config = SigningConfig {
//!     issuer: "streamfox".to_string(),
//!     key: SecretString::from("0123456789abcdef0123456789abcdef"),
//! };
//!
//! assert!(!format!("{config:?}").contains("0123456789"));
//! assert_eq!(config.key.expose_secret().len(), 32);
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("stream-signing-key");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("stream-signing-key"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("token-secret");
        assert_eq!(secret.expose_secret(), "token-secret");
    }

    #[test]
    fn test_deserialize_keeps_value_hidden() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct StreamKey {
            owner: String,
            token: SecretString,
        }

        let json = r#"{"owner": "alice", "token": "eyJhbGciOi"}"#;
        let key: StreamKey = serde_json::from_str(json).expect("deserialize");

        assert_eq!(key.token.expose_secret(), "eyJhbGciOi");

        let debug = format!("{key:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("eyJhbGciOi"));
    }
}
