//! The broadcast server: marker replay, telemetry fan-out and close-all.
//!
//! Connection lifecycle as driven by the transport:
//!
//! ```text
//! Connecting --open()--> Open --disconnect()--> Closed
//!                         |  ^
//!                         +--+ broadcast(): frame skipped on an encoding failure
//! ```
//!
//! [`BroadcastServer::open`] queues every target marker, then every
//! boundary marker, and only then adds the viewer to the registry. A viewer
//! whose replay fails is never registered, so no viewer receives live
//! telemetry without the full marker set in front of it.
//!
//! [`BroadcastServer::broadcast`] encodes each snapshot once and offers the
//! same frame to every registered viewer. Outcomes per viewer:
//!
//! | Send result | Action |
//! |-------------|--------|
//! | `Ok` | counted as delivered |
//! | `Encoding` | logged, viewer kept, fan-out continues |
//! | `Closed` | viewer removed |
//! | `Backlogged` | viewer closed and removed |

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use sailwatch_core::TelemetrySink;
use sailwatch_types::{ConnectionId, MarkerStore, TelemetrySnapshot, WireMessage};
use tracing::{debug, error, info, warn};

use crate::error::RelayError;
use crate::registry::ConnectionRegistry;
use crate::viewer::{SendError, Viewer};

/// Per-viewer resource limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Live frames a viewer may have queued before it is dropped.
    pub queue_capacity: usize,
    /// Largest frame a viewer will accept.
    pub max_frame_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            max_frame_bytes: 65_536,
        }
    }
}

/// Outcome counts of a single fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Viewers that accepted the frame.
    pub delivered: usize,
    /// Viewers that rejected this frame but stay registered.
    pub rejected: usize,
    /// Viewers removed because their channel was closed or backlogged.
    pub dropped: usize,
}

/// Owns the connection registry and the marker set.
#[derive(Debug)]
pub struct BroadcastServer {
    markers: MarkerStore,
    replay: Vec<Utf8Bytes>,
    registry: ConnectionRegistry,
    config: RelayConfig,
}

impl BroadcastServer {
    /// Create a server that replays `markers` to every new viewer.
    ///
    /// Replay frames are encoded once here and checked against the frame
    /// limit.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Encode`] if a marker cannot be serialized, or
    /// [`RelayError::ReplayFrameTooLarge`] if a marker frame exceeds
    /// `config.max_frame_bytes`.
    pub fn new(markers: MarkerStore, config: RelayConfig) -> Result<Self, RelayError> {
        let replay = markers
            .iter()
            .map(|marker| encode(&WireMessage::from(marker)))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some((index, frame)) = replay
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.as_str().len() > config.max_frame_bytes)
        {
            return Err(RelayError::ReplayFrameTooLarge {
                index,
                len: frame.as_str().len(),
                limit: config.max_frame_bytes,
            });
        }
        Ok(Self {
            markers,
            replay,
            registry: ConnectionRegistry::new(),
            config,
        })
    }

    /// The markers replayed on connect.
    pub const fn marker_store(&self) -> &MarkerStore {
        &self.markers
    }

    /// Number of registered viewers.
    pub fn viewer_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether a viewer with this id is registered.
    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.registry.contains(id)
    }

    /// Queue size for a new viewer: the full replay burst plus the live
    /// backlog allowance.
    pub fn queue_capacity(&self) -> usize {
        self.config.queue_capacity.saturating_add(self.replay.len())
    }

    /// Largest frame a viewer will be sent.
    pub const fn max_frame_bytes(&self) -> usize {
        self.config.max_frame_bytes
    }

    /// Replay all markers to `viewer`, then register it.
    ///
    /// One frame per marker, targets first, each group in insertion
    /// order. Re-opening an already registered viewer replays again but
    /// does not duplicate its membership.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Replay`] if any replay frame is not accepted.
    /// The viewer is then not registered; frames already accepted stay
    /// sent.
    pub fn open(&self, viewer: Arc<dyn Viewer>) -> Result<(), RelayError> {
        let id = viewer.id();
        info!(conn = %id, markers = self.replay.len(), "New connection established");

        for (sent, frame) in self.replay.iter().enumerate() {
            viewer
                .send(frame)
                .map_err(|source| RelayError::Replay { id, sent, source })?;
        }

        self.registry.add(viewer);
        debug!(conn = %id, viewers = self.registry.len(), "Viewer registered");
        Ok(())
    }

    /// Forget a viewer whose transport reported closure. Unknown ids are
    /// ignored.
    pub fn disconnect(&self, id: ConnectionId) {
        if self.registry.remove(id) {
            info!(conn = %id, viewers = self.registry.len(), "Connection closed");
        } else {
            debug!(conn = %id, "Connection closed before registration");
        }
    }

    /// Handle a message received from a viewer. Inbound traffic has no
    /// effect on relay state; it is only logged.
    pub fn receive(&self, id: ConnectionId, message: &str) {
        info!(conn = %id, text = message, "Received message");
    }

    /// Send one snapshot to every registered viewer.
    ///
    /// With no viewers registered the snapshot is dropped. A failure on
    /// one viewer never stops delivery to the rest, and failed writes are
    /// not retried.
    pub fn broadcast(&self, snapshot: &TelemetrySnapshot) -> BroadcastReport {
        match encode(&WireMessage::Data(*snapshot)) {
            Ok(frame) => self.fan_out(&frame),
            Err(e) => {
                error!(error = %e, "Failed to encode telemetry snapshot");
                BroadcastReport::default()
            }
        }
    }

    /// Send a log record to every registered viewer.
    pub fn broadcast_log(&self, level: &str, message: &str) -> BroadcastReport {
        let record = WireMessage::Log {
            level: level.to_owned(),
            message: message.to_owned(),
        };
        match encode(&record) {
            Ok(frame) => self.fan_out(&frame),
            Err(e) => {
                error!(error = %e, "Failed to encode log record");
                BroadcastReport::default()
            }
        }
    }

    /// Ask every registered viewer's transport to close.
    ///
    /// Members stay registered until their transport reports the close
    /// through [`disconnect`](Self::disconnect). Returns the number of
    /// viewers asked.
    pub fn close_all(&self) -> usize {
        let mut requested: usize = 0;
        self.registry.for_each(|viewer| {
            viewer.close();
            requested = requested.saturating_add(1);
        });
        info!(viewers = requested, "Closing all connections");
        requested
    }

    fn fan_out(&self, frame: &Utf8Bytes) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        self.registry.for_each(|viewer| {
            let id = viewer.id();
            match viewer.send(frame) {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(SendError::Encoding(reason)) => {
                    error!(conn = %id, %reason, "Tried to send invalid value");
                    report.rejected = report.rejected.saturating_add(1);
                }
                Err(SendError::Closed) => {
                    debug!(conn = %id, "Viewer channel closed, removing");
                    self.registry.remove(id);
                    report.dropped = report.dropped.saturating_add(1);
                }
                Err(SendError::Backlogged) => {
                    warn!(conn = %id, "Viewer stopped reading, dropping connection");
                    viewer.close();
                    self.registry.remove(id);
                    report.dropped = report.dropped.saturating_add(1);
                }
            }
        });
        report
    }
}

impl TelemetrySink for BroadcastServer {
    fn publish(&self, snapshot: &TelemetrySnapshot) {
        let report = self.broadcast(snapshot);
        debug!(
            delivered = report.delivered,
            rejected = report.rejected,
            dropped = report.dropped,
            "Telemetry relayed"
        );
    }
}

fn encode(message: &WireMessage) -> Result<Utf8Bytes, serde_json::Error> {
    serde_json::to_string(message).map(Utf8Bytes::from)
}
