//! Axum router construction.
//!
//! Assembles the viewer page, the push channel and the status endpoint
//! into a single [`Router`] with CORS and request tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::broadcast::BroadcastServer;
use crate::{handlers, ws};

/// Build the complete Axum router for the relay.
///
/// - `GET /` -- viewer page
/// - `GET /ws` -- `WebSocket` push channel
/// - `GET /api/status` -- viewer and marker counts
///
/// Any origin may connect; viewers are not authenticated.
pub fn build_router(server: Arc<BroadcastServer>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/status", get(handlers::status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}
