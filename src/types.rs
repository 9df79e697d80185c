//! Artifact data model shared by the writers, the reader, and the validator.
//!
//! Field names follow the persisted JSON layout: run fields are snake_case,
//! stats fields are camelCase.

use serde::{Deserialize, Serialize};

/// Name used when a run has no name.
pub const DEFAULT_RUN_NAME: &str = "Untitled Run";

/// Name used when a route has no name.
pub const DEFAULT_ROUTE_NAME: &str = "Untitled Route";

/// A coordinate pair as persisted in route geometry: `[lat, lng]`.
pub type LatLng = [f64; 2];

/// A decoded GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite, inside WGS84 ranges, and not the (0, 0) "no fix" sentinel.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
            && !(self.lat == 0.0 && self.lng == 0.0)
    }

    pub fn to_lat_lng(self) -> LatLng {
        [self.lat, self.lng]
    }
}

/// One completed run with a starting location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    /// ISO-8601 instant; consumers must tolerate unparsable values
    pub date: String,
    /// Distance in meters
    pub distance: f64,
    /// Moving time in seconds
    pub moving_time: f64,
    /// Paths under the public media directory, e.g. `run-media/123.jpg`
    #[serde(default)]
    pub media: Vec<String>,
    #[serde(default)]
    pub gear: String,
}

/// A named polyline independent of any run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub coordinates: Vec<LatLng>,
}

/// Aggregates derived from the run set. Never the source of truth.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_runs: usize,
    /// Sum of run distances in meters
    pub total_distance: f64,
    pub unique_locations: usize,
    /// `[earliest, latest]`, or empty when no run date parses
    pub date_range: Vec<String>,
}

/// The persisted cache artifact.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CacheArtifact {
    pub runs: Vec<RunRecord>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub stats: Stats,
}

impl CacheArtifact {
    /// Build an artifact with stats computed from `runs`.
    pub fn from_parts(runs: Vec<RunRecord>, routes: Vec<Route>) -> Self {
        let stats = crate::stats::compute_stats(&runs);
        Self {
            runs,
            routes,
            stats,
        }
    }
}
