//! Telemetry relay server for Sailwatch.
//!
//! This crate owns everything between the telemetry producer and the
//! viewers' browsers:
//!
//! - **Connection registry** ([`registry`]) of viewers that completed
//!   marker replay and are eligible for live frames
//! - **Viewer send paths** ([`viewer`]): one bounded queue and one writer
//!   task per WebSocket, so a stalled viewer never delays the others
//! - **Broadcast server** ([`broadcast`]): replay-then-register on connect,
//!   encode-once fan-out of snapshots, close-all
//! - **Transport** ([`ws`], [`router`], [`handlers`], [`listener`],
//!   [`startup`]): `GET /` viewer page, `GET /ws` push channel,
//!   `GET /api/status`
//! - **Log forwarding** ([`log_layer`]): a `tracing` layer that pushes log
//!   records to viewers
//!
//! # Architecture
//!
//! The producer calls [`BroadcastServer::broadcast`] from its own task on a
//! fixed interval while connection handlers call
//! [`BroadcastServer::open`] and [`BroadcastServer::disconnect`] from the
//! Axum tasks. The registry is a concurrent map and every fan-out iterates
//! a point-in-time copy of it; a connection only enters the map after its
//! replay frames are queued, so replay and live frames never interleave.

pub mod broadcast;
pub mod error;
pub mod handlers;
pub mod listener;
pub mod log_layer;
pub mod registry;
pub mod router;
pub mod startup;
pub mod viewer;
pub mod ws;

// Re-export primary types for convenience.
pub use broadcast::{BroadcastReport, BroadcastServer, RelayConfig};
pub use error::RelayError;
pub use listener::{ListenerConfig, ServerError, start_server};
pub use log_layer::{LogForwardHandle, ViewerLogLayer, viewer_log_layer};
pub use registry::ConnectionRegistry;
pub use router::build_router;
pub use startup::{RunningListener, spawn_listener};
pub use viewer::{ChannelViewer, SendError, Viewer, ViewerOutbox};
