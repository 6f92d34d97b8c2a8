//! Shared type definitions for the Sailwatch telemetry relay.
//!
//! This crate is the single source of truth for the values that travel
//! between the vehicle-side producer, the relay server and the viewers.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifier for viewer connections
//! - [`location`] -- Coordinates, marker roles and the immutable marker store
//! - [`telemetry`] -- The per-tick vehicle state snapshot
//! - [`wire`] -- The JSON frames pushed to viewers

pub mod ids;
pub mod location;
pub mod telemetry;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use ids::ConnectionId;
pub use location::{Location, Marker, MarkerRole, MarkerStore};
pub use telemetry::TelemetrySnapshot;
pub use wire::WireMessage;
