//! HTTP routes for the live service.
//!
//! Defines the Axum router and application state.

use crate::auth::TokenService;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_api_auth, require_streaming_auth};
use crate::rooms::RoomRegistry;
use crate::transport::NegotiationTransport;
use crate::upload::UploadSessionRegistry;
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Open rooms.
    pub rooms: Arc<RoomRegistry>,

    /// Upload sessions by streaming identity.
    pub uploads: Arc<UploadSessionRegistry>,

    /// Token issuance and verification.
    pub tokens: Arc<TokenService>,
}

impl AppState {
    /// Build state with fresh registries negotiating through `transport`.
    #[must_use]
    pub fn new(config: Config, transport: Arc<dyn NegotiationTransport>) -> Self {
        let tokens = Arc::new(TokenService::new(
            &config.token_secret,
            config.jwt_clock_skew(),
        ));
        let uploads = Arc::new(UploadSessionRegistry::new(
            transport,
            config.negotiation_timeout,
        ));

        Self {
            config,
            rooms: Arc::new(RoomRegistry::new()),
            uploads,
            tokens,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe with registry sizes - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `GET /live/rooms`, `GET /live/rooms/:id` - public
/// - `POST /live/rooms`, `DELETE /live/rooms/:id`, `GET /live/stream-key` - API token
/// - `POST /live/upload`, `DELETE /live/upload` - streaming token
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let tokens = Arc::clone(&state.tokens);

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/live/rooms", get(handlers::list_rooms))
        .route("/live/rooms/:id", get(handlers::get_room))
        .with_state(Arc::clone(&state));

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // API token routes
    let api_routes = Router::new()
        .route("/live/rooms", post(handlers::create_room))
        .route("/live/rooms/:id", delete(handlers::delete_room))
        .route("/live/stream-key", get(handlers::get_stream_key))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&tokens),
            require_api_auth,
        ))
        .with_state(Arc::clone(&state));

    // Streaming token routes
    let upload_routes = Router::new()
        .route(
            "/live/upload",
            post(handlers::begin_upload).delete(handlers::end_upload),
        )
        .route_layer(middleware::from_fn_with_state(
            tokens,
            require_streaming_auth,
        ))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(api_routes)
        .merge(upload_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
