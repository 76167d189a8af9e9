//! Request and response bodies for the HTTP API.
//!
//! All JSON field names are camelCase.

use crate::rooms::{Room, RoomSummary, UserInfo};
use chrono::{DateTime, Utc};
use common::types::RoomId;
use serde::{Deserialize, Serialize};

/// Body of `POST /live/rooms`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Room name, 2..=256 characters.
    pub name: String,

    /// `0` = public, `1` = unlisted.
    pub visibility: u8,
}

/// Response of `POST /live/rooms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreatedResponse {
    pub id: RoomId,
}

/// Room as returned by the listing and detail endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub id: RoomId,
    pub name: String,
    pub creator: UserInfo,
    pub created_at: DateTime<Utc>,
    pub participants: usize,
}

impl From<RoomSummary> for RoomInfo {
    fn from(summary: RoomSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            creator: summary.creator,
            created_at: summary.created_at,
            participants: summary.participants,
        }
    }
}

impl From<&Room> for RoomInfo {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id(),
            name: room.name().to_string(),
            creator: room.creator().clone(),
            created_at: room.created_at(),
            participants: room.participants(),
        }
    }
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always "healthy" while the process is serving.
    pub status: String,

    /// Registered rooms.
    pub rooms: usize,

    /// Occupied upload session slots.
    pub upload_sessions: usize,
}
