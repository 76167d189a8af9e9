//! `Room` - one live broadcast.
//!
//! A room owns its participant counter and a one-shot closed notification.
//! Both are mutated only through the methods here.

use crate::errors::LiveError;
use chrono::{DateTime, Utc};
use common::types::{RoomId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Minimum room name length, in characters.
pub const MIN_ROOM_NAME_CHARS: usize = 2;

/// Maximum room name length, in characters.
pub const MAX_ROOM_NAME_CHARS: usize = 256;

/// Discovery visibility of a room.
///
/// Wire values: `0` = public, `1` = unlisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Shown in discovery listings.
    Public,
    /// Reachable by id only.
    Unlisted,
}

impl TryFrom<u8> for Visibility {
    type Error = LiveError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Visibility::Public),
            1 => Ok(Visibility::Unlisted),
            other => Err(LiveError::Validation(format!(
                "visibility must be 0 or 1, got {other}"
            ))),
        }
    }
}

impl From<Visibility> for u8 {
    fn from(value: Visibility) -> Self {
        match value {
            Visibility::Public => 0,
            Visibility::Unlisted => 1,
        }
    }
}

/// Public identity of a user as shown on rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    pub name: String,
}

/// A live room.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    creator: UserInfo,
    created_at: DateTime<Utc>,
    visibility: Visibility,
    participants: AtomicUsize,
    closed: CancellationToken,
}

impl Room {
    /// Create an open room with no participants.
    ///
    /// # Errors
    ///
    /// Returns `LiveError::Validation` if `name` is not 2..=256 characters.
    pub fn new(name: String, creator: UserInfo, visibility: Visibility) -> Result<Self, LiveError> {
        validate_room_name(&name)?;

        Ok(Self {
            id: RoomId::new(),
            name,
            creator,
            created_at: Utc::now(),
            visibility,
            participants: AtomicUsize::new(0),
            closed: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn id(&self) -> RoomId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn creator(&self) -> &UserInfo {
        &self.creator
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Current participant count.
    #[must_use]
    pub fn participants(&self) -> usize {
        self.participants.load(Ordering::Acquire)
    }

    /// Record a participant joining. Returns the new count.
    pub fn join(&self) -> usize {
        self.participants.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Record a participant leaving. Saturates at zero; returns the new count.
    pub fn leave(&self) -> usize {
        let previous = self
            .participants
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or_else(|n| n);
        previous.saturating_sub(1)
    }

    /// Close the room. Idempotent; every waiter on [`Room::closed`] wakes once.
    pub fn close(&self) {
        self.closed.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the room has closed (immediately if it already has).
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Owned handle on the closed notification, for tasks that must not
    /// borrow the room.
    #[must_use]
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

/// Check a room name is 2..=256 characters.
///
/// # Errors
///
/// Returns `LiveError::Validation` when out of range.
pub fn validate_room_name(name: &str) -> Result<(), LiveError> {
    let chars = name.chars().count();
    if !(MIN_ROOM_NAME_CHARS..=MAX_ROOM_NAME_CHARS).contains(&chars) {
        return Err(LiveError::Validation(format!(
            "name must be between {MIN_ROOM_NAME_CHARS} and {MAX_ROOM_NAME_CHARS} characters, got {chars}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn creator() -> UserInfo {
        UserInfo {
            id: UserId::new(),
            name: "alice".to_string(),
        }
    }

    #[test]
    fn test_name_length_bounds() {
        assert!(validate_room_name("A").is_err());
        assert!(validate_room_name("").is_err());
        assert!(validate_room_name("ok").is_ok());
        assert!(validate_room_name(&"x".repeat(256)).is_ok());
        assert!(validate_room_name(&"x".repeat(257)).is_err());
    }

    #[test]
    fn test_name_length_counts_characters_not_bytes() {
        // 256 two-byte characters is still within the limit
        assert!(validate_room_name(&"é".repeat(256)).is_ok());
        assert!(validate_room_name("é").is_err());
    }

    #[test]
    fn test_visibility_wire_values() {
        assert_eq!(Visibility::try_from(0).unwrap(), Visibility::Public);
        assert_eq!(Visibility::try_from(1).unwrap(), Visibility::Unlisted);
        assert!(matches!(
            Visibility::try_from(2),
            Err(LiveError::Validation(_))
        ));
        assert_eq!(u8::from(Visibility::Unlisted), 1);
    }

    #[test]
    fn test_join_and_leave() {
        let room = Room::new("Chess Stream".to_string(), creator(), Visibility::Public).unwrap();

        assert_eq!(room.participants(), 0);
        assert_eq!(room.join(), 1);
        assert_eq!(room.join(), 2);
        assert_eq!(room.leave(), 1);
        assert_eq!(room.leave(), 0);
    }

    #[test]
    fn test_leave_saturates_at_zero() {
        let room = Room::new("Empty".to_string(), creator(), Visibility::Public).unwrap();

        assert_eq!(room.leave(), 0);
        assert_eq!(room.participants(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let room = Room::new("Closing".to_string(), creator(), Visibility::Unlisted).unwrap();

        assert!(!room.is_closed());
        room.close();
        room.close();
        assert!(room.is_closed());
    }

    #[tokio::test]
    async fn test_close_wakes_every_waiter() {
        let room = Arc::new(Room::new("Waiters".to_string(), creator(), Visibility::Public).unwrap());

        let mut waiters = Vec::new();
        for _ in 0..3 {
            let room = Arc::clone(&room);
            waiters.push(tokio::spawn(async move { room.closed().await }));
        }

        room.close();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter should wake")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_closed_resolves_after_close() {
        let room = Room::new("Late".to_string(), creator(), Visibility::Public).unwrap();
        room.close();

        // A waiter registered after the fire still observes it
        tokio::time::timeout(Duration::from_millis(100), room.closed())
            .await
            .expect("closed() should resolve immediately");
    }
}
