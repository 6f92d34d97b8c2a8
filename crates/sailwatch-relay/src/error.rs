//! Error types for the relay core.
//!
//! Per-viewer write failures are described by [`SendError`]; they never
//! escape a broadcast. [`RelayError`] covers the two failures a caller
//! does see: encoding a frame and replaying markers to a new viewer.

use sailwatch_types::ConnectionId;

use crate::viewer::SendError;

/// Errors returned by [`BroadcastServer`](crate::BroadcastServer) operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A frame could not be serialized to JSON.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// A replay frame is larger than the per-viewer frame limit, so no
    /// viewer could ever complete replay.
    #[error("marker frame {index} is {len} bytes, over the {limit} byte frame limit")]
    ReplayFrameTooLarge {
        /// Position of the frame in replay order.
        index: usize,
        /// Encoded frame length in bytes.
        len: usize,
        /// Configured `max_frame_bytes`.
        limit: usize,
    },

    /// Marker replay to a new viewer failed partway; the viewer was not
    /// registered. Frames already sent are not retracted.
    #[error("marker replay to {id} failed after {sent} frame(s): {source}")]
    Replay {
        /// The abandoned connection.
        id: ConnectionId,
        /// Replay frames accepted before the failure.
        sent: usize,
        /// The write failure.
        source: SendError,
    },
}
