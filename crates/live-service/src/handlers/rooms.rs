//! Room handlers.
//!
//! - `GET /live/rooms` - Ranked public rooms (public)
//! - `POST /live/rooms` - Create a room (api token)
//! - `GET /live/rooms/:id` - Room detail (public)
//! - `DELETE /live/rooms/:id` - Close a room (api token, creator only)
//! - `GET /live/stream-key` - Issue a streaming token (api token)

use crate::auth::{AuthUser, TokenPurpose};
use crate::errors::LiveError;
use crate::models::{CreateRoomRequest, RoomCreatedResponse, RoomInfo};
use crate::rooms::Visibility;
use crate::routes::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use common::types::RoomId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

fn parse_room_id(raw: &str) -> Result<RoomId, LiveError> {
    // Malformed ids cannot name a room
    raw.parse().map_err(|_| LiveError::RoomNotFound)
}

/// Handler for GET /live/rooms
#[instrument(skip_all, name = "live.rooms.list")]
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomInfo>> {
    Json(
        state
            .rooms
            .list_public()
            .into_iter()
            .map(RoomInfo::from)
            .collect(),
    )
}

/// Handler for POST /live/rooms
///
/// # Response
///
/// - 201 Created: `{"id": "..."}`
/// - 400 Bad Request: invalid name, visibility, or body
/// - 401 Unauthorized: missing or invalid API token
#[instrument(skip_all, name = "live.rooms.create_handler", fields(user_id = %user.id))]
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoomCreatedResponse>), LiveError> {
    let Json(request) = payload?;
    let visibility = Visibility::try_from(request.visibility)?;

    let room = state.rooms.create(request.name, user.into(), visibility)?;

    Ok((
        StatusCode::CREATED,
        Json(RoomCreatedResponse { id: room.id() }),
    ))
}

/// Handler for GET /live/rooms/:id
///
/// Unlisted rooms are returned too; only discovery hides them.
#[instrument(skip_all, name = "live.rooms.get", fields(room_id = %id))]
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RoomInfo>, LiveError> {
    let room = state.rooms.get(parse_room_id(&id)?)?;
    Ok(Json(RoomInfo::from(room.as_ref())))
}

/// Handler for DELETE /live/rooms/:id
///
/// # Response
///
/// - 204 No Content: room closed
/// - 403 Forbidden: caller is not the creator
/// - 404 Not Found: unknown or already closed room
#[instrument(skip_all, name = "live.rooms.delete", fields(room_id = %id, user_id = %user.id))]
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, LiveError> {
    let room = state.rooms.get(parse_room_id(&id)?)?;

    if room.creator().id != user.id {
        warn!(
            target: "live.rooms",
            room_id = %room.id(),
            user_id = %user.id,
            "Non-creator attempted to close room"
        );
        return Err(LiveError::Forbidden(
            "Only the room creator can close the room".to_string(),
        ));
    }

    room.close();
    info!(target: "live.rooms", room_id = %room.id(), "Room closed by creator");

    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /live/stream-key
///
/// Returns a streaming-scoped token as `text/plain`.
#[instrument(skip_all, name = "live.rooms.stream_key", fields(user_id = %user.id))]
pub async fn get_stream_key(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<String, LiveError> {
    state.tokens.issue(
        &user,
        TokenPurpose::Streaming,
        Duration::from_secs(state.config.stream_token_ttl_seconds),
    )
}
