//! The vehicle state snapshot broadcast on every reporting interval.

use serde::{Deserialize, Serialize};

use crate::location::Location;

/// One immutable telemetry record.
///
/// Produced fresh by the sensor path on each tick; the relay serializes
/// and forwards it without modification and keeps no history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Time the snapshot was taken, seconds since the Unix epoch.
    pub timestamp: f64,
    /// Current vehicle position.
    pub location: Location,
    /// Course over ground in degrees.
    pub heading: f64,
    /// Speed over ground.
    pub speed: f64,
    /// Apparent wind direction in degrees.
    pub wind_dir: f64,
    /// Roll angle in degrees.
    pub roll: f64,
    /// Pitch angle in degrees.
    pub pitch: f64,
    /// Yaw angle in degrees.
    pub yaw: f64,
    /// Discrete navigation state code.
    pub state: u8,
}
