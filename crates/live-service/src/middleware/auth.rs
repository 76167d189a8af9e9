//! Authentication middleware.
//!
//! - `require_api_auth` - accepts tokens with the `api` scope
//! - `require_streaming_auth` - accepts tokens with the `streaming` scope
//!
//! Both extract the Bearer token from the Authorization header, verify it
//! with the [`TokenService`], and insert an [`AuthUser`] into the request
//! extensions.
//!
//! [`AuthUser`]: crate::auth::AuthUser

use crate::auth::{TokenPurpose, TokenService};
use crate::errors::LiveError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Extract the Bearer token from the Authorization header.
fn extract_bearer_token(req: &Request) -> Result<&str, LiveError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "live.middleware.auth", "Missing Authorization header");
            LiveError::InvalidToken("Missing Authorization header".to_string())
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "live.middleware.auth", "Invalid Authorization header format");
        LiveError::InvalidToken("Invalid Authorization header format".to_string())
    })
}

async fn authenticate(
    tokens: &TokenService,
    purpose: TokenPurpose,
    mut req: Request,
    next: Next,
) -> Result<axum::response::Response, LiveError> {
    let user = tokens.verify(extract_bearer_token(&req)?, purpose)?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Authentication middleware for API routes.
///
/// # Response
///
/// - 401 Unauthorized if the token is missing, invalid, or not an API token
/// - Otherwise continues with `AuthUser` in extensions
#[instrument(skip_all, name = "live.middleware.api_auth")]
pub async fn require_api_auth(
    State(tokens): State<Arc<TokenService>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, LiveError> {
    authenticate(&tokens, TokenPurpose::Api, req, next).await
}

/// Authentication middleware for upload routes.
///
/// # Response
///
/// - 401 Unauthorized if the token is missing, invalid, or not a streaming token
/// - Otherwise continues with `AuthUser` in extensions
#[instrument(skip_all, name = "live.middleware.streaming_auth")]
pub async fn require_streaming_auth(
    State(tokens): State<Arc<TokenService>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, LiveError> {
    authenticate(&tokens, TokenPurpose::Streaming, req, next).await
}
