//! HTTP endpoint handlers.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Bundled viewer page |
//! | `GET` | `/api/status` | Viewer and marker counts |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use serde::Serialize;

use crate::broadcast::BroadcastServer;

/// The single-page viewer, compiled into the binary.
const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Serve the viewer page. It opens `/ws` on the same host.
pub async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

/// Body of `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Registered viewers.
    pub viewers: usize,
    /// Target markers replayed on connect.
    pub targets: usize,
    /// Boundary markers replayed on connect.
    pub boundaries: usize,
}

/// Report how many viewers are connected and how many markers they get.
pub async fn status(State(server): State<Arc<BroadcastServer>>) -> Json<StatusResponse> {
    let markers = server.marker_store();
    Json(StatusResponse {
        viewers: server.viewer_count(),
        targets: markers.targets().len(),
        boundaries: markers.boundaries().len(),
    })
}
