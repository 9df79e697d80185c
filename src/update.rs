//! # Incremental updater
//!
//! Appends runs recorded since the newest cached run without reprocessing
//! history. Fetched activities are deduplicated against the cache by exact
//! `date` equality, which holds because both writers store dates in the
//! canonical form from [`crate::dates`].
//!
//! Unlike the exporter, the updater writes both the primary cache and the
//! public copy.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::dates::{normalize_date, parse_date};
use crate::error::{PipelineError, Result};
use crate::reader::Normalizer;
use crate::store::{read_json, write_artifact};
use crate::strava::{ActivitySource, StravaActivity};
use crate::types::{CacheArtifact, Coordinate, DEFAULT_RUN_NAME, Route, RunRecord};

/// Result of one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Runs in the cache before the update
    pub existing: usize,
    /// Activities returned by the API
    pub fetched: usize,
    /// New runs appended
    pub added: usize,
    /// Runs in the cache after the update
    pub total: usize,
}

impl UpdateOutcome {
    pub fn is_up_to_date(&self) -> bool {
        self.added == 0
    }
}

/// Rebuild the stored artifact without sanitizing it.
///
/// Records that deserialize as written are kept verbatim, so an update never
/// drops data an earlier write produced. Only records that do not (legacy
/// field names, numeric strings) go through the lenient reader parse.
fn existing_artifact(value: &Value, normalizer: &Normalizer) -> CacheArtifact {
    let (raw_runs, raw_routes) = match value {
        Value::Array(runs) => (Some(runs), None),
        _ => (
            value.get("runs").and_then(Value::as_array),
            value.get("routes").and_then(Value::as_array),
        ),
    };

    let runs: Vec<RunRecord> = raw_runs
        .into_iter()
        .flatten()
        .filter_map(|raw| {
            RunRecord::deserialize(raw)
                .ok()
                .or_else(|| normalizer.parse_raw_run(raw))
        })
        .collect();
    let routes: Vec<Route> = raw_routes
        .into_iter()
        .flatten()
        .filter_map(|raw| {
            Route::deserialize(raw)
                .ok()
                .or_else(|| normalizer.parse_raw_route(raw))
        })
        .collect();

    let skipped = raw_runs.map_or(0, Vec::len) - runs.len();
    if skipped > 0 {
        warn!("[update] {} cached runs could not be read and were left out", skipped);
    }
    CacheArtifact::from_parts(runs, routes)
}

/// Load the first candidate holding an artifact with a `runs` sequence.
///
/// The legacy bare-array layout is accepted and up-converted.
pub fn load_existing(
    candidates: &[PathBuf],
    normalizer: &Normalizer,
) -> Result<(CacheArtifact, PathBuf)> {
    for path in candidates {
        let value = match read_json(path) {
            Ok(value) => value,
            Err(e) => {
                debug!("[update] Skipping cache candidate: {}", e);
                continue;
            }
        };

        let has_runs = value.is_array() || value.get("runs").is_some_and(Value::is_array);
        if has_runs {
            info!("[update] Loaded existing cache from {}", path.display());
            return Ok((existing_artifact(&value, normalizer), path.clone()));
        }
        debug!("[update] {} has no runs sequence", path.display());
    }

    Err(PipelineError::NoValidCache {
        tried: candidates.to_vec(),
    })
}

/// Unix seconds of the newest parseable run date, or 0 when none parses.
pub fn latest_cutoff(runs: &[RunRecord]) -> i64 {
    runs.iter()
        .filter_map(|r| parse_date(&r.date))
        .map(|d| d.timestamp())
        .max()
        .unwrap_or(0)
}

/// Map an API activity to a run record if it is a run with a usable start.
pub fn activity_to_run(activity: &StravaActivity, run_type: &str) -> Option<RunRecord> {
    if !activity.is_type(run_type) {
        return None;
    }

    let start = match activity.start_latlng.as_deref() {
        Some([Some(lat), Some(lng), ..]) => Coordinate::new(*lat, *lng),
        _ => return None,
    };
    if !start.is_valid() {
        return None;
    }

    let name = activity
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_RUN_NAME);
    let date = activity
        .start_date
        .as_deref()
        .or(activity.start_date_local.as_deref())
        .unwrap_or("");
    let non_negative = |v: Option<f64>| v.filter(|n| n.is_finite() && *n >= 0.0).unwrap_or(0.0);

    Some(RunRecord {
        lat: start.lat,
        lng: start.lng,
        name: name.to_string(),
        date: normalize_date(date),
        distance: non_negative(activity.distance),
        moving_time: non_negative(activity.moving_time),
        media: Vec::new(),
        gear: activity
            .gear
            .as_ref()
            .and_then(|g| g.name.clone())
            .unwrap_or_default(),
    })
}

/// Keep fetched runs whose date is not already present.
///
/// Dates seen earlier in `fetched` also count, so the API repeating an
/// activity across pages cannot introduce a duplicate.
pub fn merge_new_runs(existing: &[RunRecord], fetched: Vec<RunRecord>) -> Vec<RunRecord> {
    let mut seen: HashSet<String> = existing.iter().map(|r| r.date.clone()).collect();
    fetched
        .into_iter()
        .filter(|r| seen.insert(r.date.clone()))
        .collect()
}

/// Fetch, merge, and write both artifact copies.
pub async fn apply_update<S: ActivitySource>(
    config: &PipelineConfig,
    existing: CacheArtifact,
    source: &mut S,
) -> Result<UpdateOutcome> {
    let start = Instant::now();
    let cutoff = latest_cutoff(&existing.runs);
    info!(
        "[update] {} cached runs, fetching activities after {}",
        existing.runs.len(),
        cutoff
    );

    let activities = source.fetch_activities_after(cutoff).await?;
    let run_type = &config.export.run_activity_type;
    let candidates: Vec<RunRecord> = activities
        .iter()
        .filter_map(|a| activity_to_run(a, run_type))
        .collect();
    let new_runs = merge_new_runs(&existing.runs, candidates);

    let mut outcome = UpdateOutcome {
        existing: existing.runs.len(),
        fetched: activities.len(),
        added: new_runs.len(),
        total: existing.runs.len(),
    };

    if new_runs.is_empty() {
        info!(
            "[update] Up to date ({} activities fetched, none new)",
            activities.len()
        );
        return Ok(outcome);
    }

    let CacheArtifact {
        mut runs, routes, ..
    } = existing;
    runs.extend(new_runs);
    outcome.total = runs.len();

    let artifact = CacheArtifact::from_parts(runs, routes);
    write_artifact(&config.paths.cache_path, &artifact)?;
    write_artifact(&config.paths.public_cache_path, &artifact)?;

    info!(
        "[update] Added {} runs, {} total ({} ms)",
        outcome.added,
        outcome.total,
        start.elapsed().as_millis()
    );
    Ok(outcome)
}
