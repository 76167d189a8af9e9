//! Upload session handlers.
//!
//! - `POST /live/upload` - Begin an upload session (streaming token)
//! - `DELETE /live/upload` - End the caller's upload session (streaming token)

use crate::auth::AuthUser;
use crate::errors::LiveError;
use crate::routes::AppState;
use crate::transport::SessionDescription;
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    Extension,
};
use std::sync::Arc;
use tracing::instrument;

/// Media type of SDP bodies.
pub const APPLICATION_SDP: &str = "application/sdp";

/// Handler for POST /live/upload
///
/// The request body is the raw SDP offer.
///
/// # Response
///
/// - 201 Created: body is the SDP answer, `Location` is the request path
/// - 400 Bad Request: empty offer
/// - 409 Conflict: caller already has an upload session
/// - 500 Internal Server Error: negotiation failed
/// - 503 Service Unavailable: the service is shutting down
#[instrument(skip_all, name = "live.upload.begin_handler", fields(user_id = %user.id))]
pub async fn begin_upload(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    uri: Uri,
    offer: String,
) -> Result<impl IntoResponse, LiveError> {
    if offer.trim().is_empty() {
        return Err(LiveError::Validation("SDP offer is empty".to_string()));
    }

    let answer = state
        .uploads
        .begin_session(user.id, SessionDescription::offer(offer))
        .await?;

    Ok((
        StatusCode::CREATED,
        [
            (header::LOCATION, uri.path().to_string()),
            (header::CONTENT_TYPE, APPLICATION_SDP.to_string()),
        ],
        answer.sdp,
    ))
}

/// Handler for DELETE /live/upload
///
/// # Response
///
/// - 204 No Content: session closed
/// - 409 Conflict: caller has no pending or active session
#[instrument(skip_all, name = "live.upload.end_handler", fields(user_id = %user.id))]
pub async fn end_upload(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode, LiveError> {
    state.uploads.end_session(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
