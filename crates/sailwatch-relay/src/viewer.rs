//! Per-viewer send paths.
//!
//! The registry never touches sockets. It holds [`Viewer`] handles whose
//! [`Viewer::send`] is a non-blocking enqueue; for WebSocket viewers the
//! queue is a bounded [`mpsc`] channel drained by a dedicated writer task
//! ([`ViewerOutbox::drain`]). Frames for one viewer leave in the order
//! they were enqueued.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes};
use futures::{Sink, SinkExt};
use sailwatch_types::ConnectionId;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc};
use tracing::debug;

/// Why a frame could not be handed to a viewer.
///
/// The kind decides what the broadcast does with the viewer: an
/// [`Encoding`](Self::Encoding) failure only skips this frame, the other
/// two remove the viewer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The viewer's send path is gone.
    #[error("viewer channel closed")]
    Closed,

    /// The viewer's outbound queue is full; it has stopped reading.
    #[error("viewer outbound queue is full")]
    Backlogged,

    /// This frame cannot be written to this viewer.
    #[error("frame rejected: {0}")]
    Encoding(String),
}

/// A registered viewer as seen by the broadcast server.
pub trait Viewer: Send + Sync {
    /// Identity used for registry membership.
    fn id(&self) -> ConnectionId;

    /// Enqueue one text frame without waiting for the network.
    ///
    /// # Errors
    ///
    /// Returns the [`SendError`] kind describing why the frame was not
    /// accepted.
    fn send(&self, frame: &Utf8Bytes) -> Result<(), SendError>;

    /// Ask the transport to close this viewer. Best effort; returns
    /// immediately.
    fn close(&self);
}

/// Create a linked viewer handle and outbox.
///
/// `capacity` bounds the number of frames waiting for the writer;
/// frames longer than `max_frame_bytes` are rejected with
/// [`SendError::Encoding`].
pub fn channel(capacity: usize, max_frame_bytes: usize) -> (ChannelViewer, ViewerOutbox) {
    let id = ConnectionId::new();
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let close = Arc::new(Notify::new());
    let viewer = ChannelViewer {
        id,
        tx,
        close: Arc::clone(&close),
        max_frame_bytes,
    };
    let outbox = ViewerOutbox { id, rx, close };
    (viewer, outbox)
}

/// Queue-backed [`Viewer`] for a WebSocket connection.
#[derive(Debug, Clone)]
pub struct ChannelViewer {
    id: ConnectionId,
    tx: mpsc::Sender<Utf8Bytes>,
    close: Arc<Notify>,
    max_frame_bytes: usize,
}

impl Viewer for ChannelViewer {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, frame: &Utf8Bytes) -> Result<(), SendError> {
        let len = frame.as_str().len();
        if len > self.max_frame_bytes {
            return Err(SendError::Encoding(format!(
                "{len} bytes exceeds the {} byte frame limit",
                self.max_frame_bytes
            )));
        }
        self.tx.try_send(frame.clone()).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Backlogged,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    fn close(&self) {
        self.close.notify_one();
    }
}

/// Receiving half of a [`ChannelViewer`], owned by the writer task.
#[derive(Debug)]
pub struct ViewerOutbox {
    id: ConnectionId,
    rx: mpsc::Receiver<Utf8Bytes>,
    close: Arc<Notify>,
}

impl ViewerOutbox {
    /// Identity of the paired viewer.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Forward queued frames to `sink` until the viewer is closed, every
    /// handle is dropped, or a write fails.
    ///
    /// A close request sends a close frame and stops without flushing
    /// the frames still queued. When every handle is dropped the frames
    /// already queued are sent and the sink is closed.
    pub async fn drain<S>(self, mut sink: S)
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
    {
        let Self { id, mut rx, close } = self;
        loop {
            tokio::select! {
                biased;
                () = close.notified() => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        debug!(conn = %id, "Close frame not delivered: {e}");
                    }
                    break;
                }
                frame = rx.recv() => {
                    let Some(frame) = frame else {
                        // Flushes anything the protocol queued, such as the
                        // reply to a close from the viewer.
                        if let Err(e) = sink.close().await {
                            debug!(conn = %id, "Viewer sink close failed: {e}");
                        }
                        break;
                    };
                    if let Err(e) = sink.send(Message::Text(frame)).await {
                        debug!(conn = %id, "Viewer write failed: {e}");
                        break;
                    }
                }
            }
        }
        debug!(conn = %id, "Viewer writer stopped");
    }
}
