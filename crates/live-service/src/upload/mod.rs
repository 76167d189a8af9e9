//! Upload sessions: the per-identity ingestion state machine and the
//! registry that keeps one session per streaming identity.

pub mod registry;
pub mod session;

pub use registry::UploadSessionRegistry;
pub use session::{SessionState, UploadSession};
