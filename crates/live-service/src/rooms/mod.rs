//! Live rooms and the room registry.
//!
//! - `room` - A single broadcast with its participant counter and closed signal
//! - `registry` - Concurrent room registry with discovery ranking

pub mod registry;
pub mod room;

pub use registry::{RoomRegistry, RoomSummary};
pub use room::{Room, UserInfo, Visibility};
