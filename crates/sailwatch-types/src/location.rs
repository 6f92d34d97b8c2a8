//! Coordinates and the static reference markers replayed to viewers.
//!
//! A [`MarkerStore`] is built once at startup from configuration and is
//! never mutated afterwards. The relay only ever reads it.

use serde::{Deserialize, Serialize};

/// A pair of geographic coordinates in decimal degrees.
///
/// Used both for the live vehicle position and for static markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lon: f64,
}

impl Location {
    /// Create a location from latitude and longitude.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Whether both coordinates are finite and inside the valid
    /// latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// The role a marker plays on the viewer's map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerRole {
    /// A waypoint the vehicle is steering towards.
    Target,
    /// A vertex of the operating-area boundary.
    Boundary,
}

/// A [`Location`] tagged with its [`MarkerRole`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    /// Whether this is a target or a boundary marker.
    pub role: MarkerRole,
    /// Where the marker sits.
    pub location: Location,
}

/// Immutable target and boundary lists.
///
/// Insertion order is display order. Iteration yields every target
/// first, then every boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerStore {
    targets: Vec<Location>,
    boundaries: Vec<Location>,
}

impl MarkerStore {
    /// Build a store from the two ordered marker lists.
    pub const fn new(targets: Vec<Location>, boundaries: Vec<Location>) -> Self {
        Self {
            targets,
            boundaries,
        }
    }

    /// Target locations in insertion order.
    pub fn targets(&self) -> &[Location] {
        &self.targets
    }

    /// Boundary locations in insertion order.
    pub fn boundaries(&self) -> &[Location] {
        &self.boundaries
    }

    /// Total number of markers across both lists.
    pub fn len(&self) -> usize {
        self.targets.len().saturating_add(self.boundaries.len())
    }

    /// Whether the store holds no markers at all.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.boundaries.is_empty()
    }

    /// Iterate all markers in replay order: targets, then boundaries.
    pub fn iter(&self) -> impl Iterator<Item = Marker> + '_ {
        let targets = self.targets.iter().map(|location| Marker {
            role: MarkerRole::Target,
            location: *location,
        });
        let boundaries = self.boundaries.iter().map(|location| Marker {
            role: MarkerRole::Boundary,
            location: *location,
        });
        targets.chain(boundaries)
    }
}
