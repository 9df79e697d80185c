//! # Cache reader
//!
//! The only pipeline code that runs at serve time. Loading and normalization
//! never fail: unreadable candidates fall through to the next path, and a
//! malformed artifact degrades field by field down to an empty artifact.
//!
//! Every untyped value crosses one of the `parse_raw_*` boundary functions.
//! They are total and return `None` for anything unusable.
//!
//! Derived data is not trusted: `totalRuns`, `totalDistance` and
//! `uniqueLocations` are always recomputed, and a persisted `dateRange` is
//! kept only when it holds exactly two parseable dates.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::{PathsConfig, PipelineConfig};
use crate::dates::parse_date;
use crate::error::{PipelineError, Result};
use crate::simplify::{DEFAULT_MAX_ROUTE_POINTS, simplify_route};
use crate::stats::{compute_date_range, compute_stats};
use crate::types::{
    CacheArtifact, Coordinate, DEFAULT_ROUTE_NAME, DEFAULT_RUN_NAME, LatLng, Route, RunRecord,
    Stats,
};

/// Outcome of trying each candidate artifact location.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub artifact: CacheArtifact,
    /// Path that parsed, if any
    pub source: Option<PathBuf>,
    /// Joined per-path failures when every candidate failed
    pub error: Option<String>,
}

/// Coerce a JSON number or numeric string to a finite float.
fn finite_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Finite and non-negative, else 0.
fn non_negative(value: Option<&Value>) -> f64 {
    finite_number(value).filter(|n| *n >= 0.0).unwrap_or(0.0)
}

fn text(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str)
}

fn non_empty_text(value: Option<&Value>, fallback: &str) -> String {
    text(value)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Parse a coordinate pair; `None` unless it is a valid fix.
pub fn parse_raw_coordinate(lat: Option<&Value>, lng: Option<&Value>) -> Option<Coordinate> {
    let coord = Coordinate::new(finite_number(lat)?, finite_number(lng)?);
    coord.is_valid().then_some(coord)
}

/// A media filename directly under the media directory.
static MEDIA_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("media filename pattern"));

/// Turns untyped artifact JSON into a well-formed [`CacheArtifact`].
#[derive(Debug, Clone)]
pub struct Normalizer {
    media_dir_name: String,
    max_route_points: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            media_dir_name: PathsConfig::default().media_dir_name,
            max_route_points: DEFAULT_MAX_ROUTE_POINTS,
        }
    }
}

impl Normalizer {
    /// Build a normalizer for stored media paths rooted at `media_dir_name`.
    pub fn new(media_dir_name: &str, max_route_points: usize) -> Result<Self> {
        let trimmed = media_dir_name.trim_matches('/');
        if trimmed.is_empty() || trimmed.split('/').any(|s| s.is_empty() || s == "..") {
            return Err(PipelineError::Config {
                message: format!("invalid media directory name '{}'", media_dir_name),
            });
        }
        Ok(Self {
            media_dir_name: trimmed.to_string(),
            max_route_points,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.media_dir_name(), config.export.max_route_points)
    }

    pub fn media_dir_name(&self) -> &str {
        &self.media_dir_name
    }

    /// Accept a media path only if it is a safe file directly under the media directory.
    pub fn sanitize_media_path(&self, value: &Value) -> Option<String> {
        let path = value.as_str()?.trim().trim_start_matches('/');
        if path.split(['/', '\\']).any(|segment| segment == "..") {
            return None;
        }
        let file = path
            .strip_prefix(self.media_dir_name.as_str())?
            .strip_prefix('/')?;
        MEDIA_FILENAME.is_match(file).then(|| path.to_string())
    }

    /// Parse one untyped run. Records without a valid fix are dropped.
    pub fn parse_raw_run(&self, value: &Value) -> Option<RunRecord> {
        let obj = value.as_object()?;
        let coord = parse_raw_coordinate(obj.get("lat"), obj.get("lng"))?;

        let media = obj
            .get("media")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|m| self.sanitize_media_path(m))
                    .collect()
            })
            .unwrap_or_default();

        Some(RunRecord {
            lat: coord.lat,
            lng: coord.lng,
            name: non_empty_text(obj.get("name"), DEFAULT_RUN_NAME),
            date: text(obj.get("date")).unwrap_or("").to_string(),
            distance: non_negative(obj.get("distance")),
            moving_time: non_negative(obj.get("moving_time").or_else(|| obj.get("movingTime"))),
            media,
            gear: text(obj.get("gear")).unwrap_or("").to_string(),
        })
    }

    /// Parse one untyped route. Routes with fewer than two valid points are dropped.
    pub fn parse_raw_route(&self, value: &Value) -> Option<Route> {
        let obj = value.as_object()?;
        let coordinates: Vec<LatLng> = obj
            .get("coordinates")?
            .as_array()?
            .iter()
            .filter_map(|pair| {
                let pair = pair.as_array()?;
                if pair.len() < 2 {
                    return None;
                }
                parse_raw_coordinate(pair.first(), pair.get(1)).map(Coordinate::to_lat_lng)
            })
            .collect();

        if coordinates.len() < 2 {
            return None;
        }

        Some(Route {
            name: non_empty_text(obj.get("name"), DEFAULT_ROUTE_NAME),
            coordinates: simplify_route(&coordinates, self.max_route_points),
        })
    }

    /// Normalize any JSON value into a well-formed artifact.
    ///
    /// A bare array is the legacy layout and is read as the run list.
    pub fn normalize(&self, value: &Value) -> CacheArtifact {
        let (raw_runs, raw_routes, raw_stats) = match value {
            Value::Array(runs) => (Some(runs), None, None),
            Value::Object(obj) => (
                obj.get("runs").and_then(Value::as_array),
                obj.get("routes").and_then(Value::as_array),
                obj.get("stats"),
            ),
            _ => (None, None, None),
        };

        let runs: Vec<RunRecord> = raw_runs
            .map(|items| items.iter().filter_map(|r| self.parse_raw_run(r)).collect())
            .unwrap_or_default();
        let routes: Vec<Route> = raw_routes
            .map(|items| items.iter().filter_map(|r| self.parse_raw_route(r)).collect())
            .unwrap_or_default();

        let dropped = raw_runs.map_or(0, Vec::len) - runs.len();
        if dropped > 0 {
            debug!("[reader] Dropped {} unusable runs", dropped);
        }

        let stats = normalize_stats(raw_stats, &runs);
        CacheArtifact {
            runs,
            routes,
            stats,
        }
    }
}

/// Persisted `dateRange` when it holds exactly two parseable date strings.
fn trusted_date_range(raw_stats: Option<&Value>) -> Option<Vec<String>> {
    let range = raw_stats?.get("dateRange")?.as_array()?;
    if range.len() != 2 {
        return None;
    }
    range
        .iter()
        .map(|v| {
            let s = v.as_str()?;
            parse_date(s).map(|_| s.to_string())
        })
        .collect()
}

fn normalize_stats(raw_stats: Option<&Value>, runs: &[RunRecord]) -> Stats {
    let mut stats = compute_stats(runs);
    stats.date_range = trusted_date_range(raw_stats).unwrap_or_else(|| compute_date_range(runs));
    stats
}

/// Try each candidate in order and normalize the first that parses as JSON.
pub fn load_artifact(candidates: &[PathBuf], normalizer: &Normalizer) -> LoadedArtifact {
    let mut failures = Vec::new();

    for path in candidates {
        match read_candidate(path) {
            Ok(value) => {
                debug!("[reader] Loaded artifact from {}", path.display());
                return LoadedArtifact {
                    artifact: normalizer.normalize(&value),
                    source: Some(path.clone()),
                    error: None,
                };
            }
            Err(message) => failures.push(message),
        }
    }

    let error = if failures.is_empty() {
        "no candidate paths configured".to_string()
    } else {
        failures.join("; ")
    };
    warn!("[reader] Falling back to empty artifact: {}", error);

    LoadedArtifact {
        artifact: CacheArtifact::default(),
        source: None,
        error: Some(error),
    }
}

fn read_candidate(path: &Path) -> std::result::Result<Value, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {}", path.display(), e))
}
