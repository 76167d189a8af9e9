//! HTTP request handlers for the live service.

pub mod health;
pub mod metrics;
pub mod rooms;
pub mod upload;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use rooms::{create_room, delete_room, get_room, get_stream_key, list_rooms};
pub use upload::{begin_upload, end_upload};
