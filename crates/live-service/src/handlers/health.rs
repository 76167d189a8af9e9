//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /health
///
/// ```json
/// { "status": "healthy", "rooms": 2, "uploadSessions": 1 }
/// ```
#[instrument(skip_all, name = "live.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        rooms: state.rooms.len(),
        upload_sessions: state.uploads.len(),
    })
}
