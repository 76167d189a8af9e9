//! Room registry.
//!
//! A sharded concurrent map from [`RoomId`] to [`Room`]. Every created room
//! gets one observer task that waits for the room to close and then removes
//! it. `get` and `list` also skip rooms that have closed but whose observer
//! has not run yet, so a closed room is never handed out.

use super::room::{Room, UserInfo, Visibility};
use crate::errors::LiveError;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use common::types::RoomId;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Point-in-time view of a room used for discovery listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub creator: UserInfo,
    pub created_at: DateTime<Utc>,
    pub participants: usize,
}

impl RoomSummary {
    fn snapshot(room: &Room) -> Self {
        Self {
            id: room.id(),
            name: room.name().to_string(),
            creator: room.creator().clone(),
            created_at: room.created_at(),
            participants: room.participants(),
        }
    }
}

/// Registry of open rooms.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Arc<Room>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a room, then start its closure observer.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `LiveError::Validation` if the name is out of range.
    #[instrument(skip_all, name = "live.rooms.create", fields(creator_id = %creator.id))]
    pub fn create(
        self: &Arc<Self>,
        name: String,
        creator: UserInfo,
        visibility: Visibility,
    ) -> Result<Arc<Room>, LiveError> {
        let room = Arc::new(Room::new(name, creator, visibility)?);
        let room_id = room.id();

        self.rooms.insert(room_id, Arc::clone(&room));
        self.spawn_closure_observer(&room);

        metrics::record_room_created();
        metrics::set_rooms_active(self.rooms.len());

        info!(
            target: "live.rooms",
            room_id = %room_id,
            visibility = ?visibility,
            "Room created"
        );

        Ok(room)
    }

    /// Look up an open room.
    ///
    /// # Errors
    ///
    /// Returns `LiveError::RoomNotFound` if the id is unknown or the room has
    /// closed.
    pub fn get(&self, id: RoomId) -> Result<Arc<Room>, LiveError> {
        self.rooms
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|room| !room.is_closed())
            .ok_or(LiveError::RoomNotFound)
    }

    /// Snapshot of every open room, in no particular order.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<Room>> {
        self.rooms
            .iter()
            .filter(|entry| !entry.value().is_closed())
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Remove a room and close it. Removing an absent id is a no-op.
    ///
    /// Closing ends the room's observer, whose own removal then finds
    /// nothing.
    pub fn remove(&self, id: RoomId) {
        if let Some((_, room)) = self.rooms.remove(&id) {
            room.close();
            metrics::set_rooms_active(self.rooms.len());
            debug!(target: "live.rooms", room_id = %id, "Room removed");
        }
    }

    /// Public rooms ranked for discovery.
    ///
    /// Ordered by participants (descending), then creation time (ascending),
    /// then id. Each room is snapshotted once before sorting.
    #[must_use]
    pub fn list_public(&self) -> Vec<RoomSummary> {
        let mut summaries: Vec<RoomSummary> = self
            .list()
            .iter()
            .filter(|room| room.is_public())
            .map(|room| RoomSummary::snapshot(room))
            .collect();

        summaries.sort_by(|a, b| {
            b.participants
                .cmp(&a.participants)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        summaries
    }

    /// Number of registered rooms, including closed rooms not yet removed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Close every registered room. Used at shutdown.
    pub fn close_all(&self) {
        for room in self.list() {
            room.close();
        }
    }

    fn spawn_closure_observer(self: &Arc<Self>, room: &Arc<Room>) {
        let registry = Arc::downgrade(self);
        let room_id = room.id();
        let closed = room.closed_token();

        tokio::spawn(async move {
            closed.cancelled().await;
            // The registry may already be gone at shutdown
            if let Some(registry) = registry.upgrade() {
                registry.remove(room_id);
                info!(target: "live.rooms", room_id = %room_id, "Room closed");
            }
        });
    }
}
