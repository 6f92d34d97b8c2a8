//! `WebSocket` handler for the viewer push channel.
//!
//! Each connection gets a bounded outbound queue drained by its own writer
//! task. The handler registers the queue with the [`BroadcastServer`]
//! (which replays the markers first), then reads until the viewer goes
//! away and unregisters it.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::broadcast::BroadcastServer;
use crate::viewer;

/// How long a closing connection's writer may take to flush.
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming markers and telemetry.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(server): State<Arc<BroadcastServer>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, server))
}

/// Handle the `WebSocket` lifecycle: spawn the writer, replay and
/// register, read until close, then let the writer drain.
async fn handle_ws(socket: WebSocket, server: Arc<BroadcastServer>) {
    let (sink, mut stream) = socket.split();
    let (viewer, outbox) = viewer::channel(server.queue_capacity(), server.max_frame_bytes());
    let id = outbox.id();
    let mut writer = tokio::spawn(outbox.drain(sink));

    // On failure `open` drops the only viewer handle, so the writer sends
    // the frames it already accepted and then stops.
    if let Err(e) = server.open(Arc::new(viewer)) {
        warn!(conn = %id, error = %e, "Marker replay failed, abandoning connection");
        return;
    }

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => server.receive(id, text.as_str()),
            Ok(Message::Binary(data)) => {
                debug!(conn = %id, bytes = data.len(), "Ignoring binary message");
            }
            Ok(Message::Close(_)) => break,
            // Pings are answered by the protocol layer.
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                debug!(conn = %id, "WebSocket error: {e}");
                break;
            }
        }
    }

    // Dropping the registry's handle ends the writer once it has flushed,
    // which also sends the reply to a viewer-initiated close.
    server.disconnect(id);
    match tokio::time::timeout(WRITER_GRACE, &mut writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(conn = %id, error = %e, "Viewer writer task failed"),
        Err(_) => {
            debug!(conn = %id, "Viewer writer did not drain in time, aborting");
            writer.abort();
        }
    }
}
