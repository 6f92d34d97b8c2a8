//! JSON frames pushed to viewers over the WebSocket.
//!
//! Every frame is a JSON object whose `category` field selects the
//! variant:
//!
//! | `category` | Shape |
//! |------------|-------|
//! | `marker` | `{category, type, location:{lat,lon}}` |
//! | `data` | `{category, timestamp, location:{lat,lon}, heading, speed, wind_dir, roll, pitch, yaw, state}` |
//! | `log` | `{category, level, message}` |

use serde::{Deserialize, Serialize};

use crate::location::{Location, Marker, MarkerRole};
use crate::telemetry::TelemetrySnapshot;

/// A single frame sent to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum WireMessage {
    /// A static reference marker, replayed when a viewer joins.
    Marker {
        /// Target or boundary.
        #[serde(rename = "type")]
        role: MarkerRole,
        /// Marker position.
        location: Location,
    },
    /// A live telemetry snapshot.
    Data(TelemetrySnapshot),
    /// A log record forwarded from the vehicle process.
    Log {
        /// Severity name, e.g. `INFO`.
        level: String,
        /// Rendered log message.
        message: String,
    },
}

impl From<Marker> for WireMessage {
    fn from(marker: Marker) -> Self {
        Self::Marker {
            role: marker.role,
            location: marker.location,
        }
    }
}

impl From<TelemetrySnapshot> for WireMessage {
    fn from(snapshot: TelemetrySnapshot) -> Self {
        Self::Data(snapshot)
    }
}
