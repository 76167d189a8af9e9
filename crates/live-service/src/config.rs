//! Live service configuration.
//!
//! Configuration is loaded from environment variables. The token signing
//! secret is held in a `SecretString` and redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Minimum token secret length in bytes (HS256 key size).
pub const MIN_TOKEN_SECRET_BYTES: usize = 32;

/// Default API token lifetime in seconds (1 hour).
pub const DEFAULT_API_TOKEN_TTL_SECONDS: u64 = 3600;

/// Default streaming token lifetime in seconds (24 hours).
pub const DEFAULT_STREAM_TOKEN_TTL_SECONDS: u64 = 86400;

/// Default negotiation timeout in seconds.
pub const DEFAULT_NEGOTIATION_TIMEOUT_SECONDS: u64 = 30;

/// Default ICE server list.
pub const DEFAULT_ICE_SERVERS: &str = "stun:stun.l.google.com:19302";

/// Default shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 5;

/// Live service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// HS256 signing secret for API and streaming tokens.
    pub token_secret: SecretString,

    /// JWT clock skew tolerance in seconds for `iat` validation.
    pub jwt_clock_skew_seconds: u64,

    /// Lifetime of API tokens.
    pub api_token_ttl_seconds: u64,

    /// Lifetime of streaming tokens handed out by `/live/stream-key`.
    pub stream_token_ttl_seconds: u64,

    /// Upload sessions still pending after this long are closed.
    /// `None` disables the timeout.
    pub negotiation_timeout: Option<Duration>,

    /// ICE server URLs passed to the WebRTC transport.
    pub ice_servers: Vec<String>,

    /// Time allowed for in-flight requests after shutdown starts.
    pub drain_seconds: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("token_secret", &"[REDACTED]")
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("api_token_ttl_seconds", &self.api_token_ttl_seconds)
            .field("stream_token_ttl_seconds", &self.stream_token_ttl_seconds)
            .field("negotiation_timeout", &self.negotiation_timeout)
            .field("ice_servers", &self.ice_servers)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid token secret: {0}")]
    InvalidTokenSecret(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid token TTL configuration: {0}")]
    InvalidTokenTtl(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value is
    /// out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let token_secret = vars
            .get("TOKEN_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("TOKEN_SECRET".to_string()))?;
        if token_secret.len() < MIN_TOKEN_SECRET_BYTES {
            return Err(ConfigError::InvalidTokenSecret(format!(
                "TOKEN_SECRET must be at least {MIN_TOKEN_SECRET_BYTES} bytes, got {}",
                token_secret.len()
            )));
        }
        let token_secret = SecretString::from(token_secret.clone());

        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwtClockSkew(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got 0".to_string(),
                ));
            }

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {value}",
                    MAX_CLOCK_SKEW.as_secs()
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs()
        };

        let api_token_ttl_seconds =
            parse_ttl(vars, "API_TOKEN_TTL_SECONDS", DEFAULT_API_TOKEN_TTL_SECONDS)?;
        let stream_token_ttl_seconds = parse_ttl(
            vars,
            "STREAM_TOKEN_TTL_SECONDS",
            DEFAULT_STREAM_TOKEN_TTL_SECONDS,
        )?;

        // 0 disables the timeout
        let negotiation_timeout = match parse_seconds(
            vars,
            "NEGOTIATION_TIMEOUT_SECONDS",
            DEFAULT_NEGOTIATION_TIMEOUT_SECONDS,
        )? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let ice_servers = vars
            .get("ICE_SERVERS")
            .map_or(DEFAULT_ICE_SERVERS, String::as_str)
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(ToString::to_string)
            .collect();

        let drain_seconds = parse_seconds(vars, "DRAIN_SECONDS", DEFAULT_DRAIN_SECONDS)?;

        Ok(Config {
            bind_address,
            token_secret,
            jwt_clock_skew_seconds,
            api_token_ttl_seconds,
            stream_token_ttl_seconds,
            negotiation_timeout,
            ice_servers,
            drain_seconds,
        })
    }

    /// Clock skew tolerance as a `Duration`.
    #[must_use]
    pub fn jwt_clock_skew(&self) -> Duration {
        Duration::from_secs(self.jwt_clock_skew_seconds)
    }

    /// Raw signing secret bytes.
    #[must_use]
    pub fn token_secret_bytes(&self) -> &[u8] {
        self.token_secret.expose_secret().as_bytes()
    }
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match vars.get(name) {
        Some(value_str) => value_str.parse().map_err(|e| {
            ConfigError::InvalidDuration(format!(
                "{name} must be a valid non-negative integer, got '{value_str}': {e}"
            ))
        }),
        None => Ok(default),
    }
}

fn parse_ttl(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTokenTtl(format!(
            "{name} must be a valid positive integer, got '{value_str}': {e}"
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidTokenTtl(format!(
            "{name} must be greater than 0"
        )));
    }

    Ok(value)
}
