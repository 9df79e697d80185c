//! Aggregate statistics over a run set.

use std::collections::HashSet;

use crate::dates::{format_iso, parse_date};
use crate::types::{RunRecord, Stats};

/// Decimal places kept when bucketing locations (~110 m at the equator).
pub const LOCATION_PRECISION: i32 = 3;

/// Rounded-coordinate bucket key for a location.
pub fn location_bucket(lat: f64, lng: f64) -> (i64, i64) {
    let scale = 10f64.powi(LOCATION_PRECISION);
    ((lat * scale).round() as i64, (lng * scale).round() as i64)
}

/// Earliest and latest parseable run dates in canonical form.
pub fn compute_date_range(runs: &[RunRecord]) -> Vec<String> {
    let mut dates = runs.iter().filter_map(|r| parse_date(&r.date));
    let Some(first) = dates.next() else {
        return Vec::new();
    };
    let (earliest, latest) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
    vec![format_iso(&earliest), format_iso(&latest)]
}

/// Recompute every stat from the run set.
pub fn compute_stats(runs: &[RunRecord]) -> Stats {
    let unique: HashSet<(i64, i64)> = runs
        .iter()
        .map(|r| location_bucket(r.lat, r.lng))
        .collect();

    Stats {
        total_runs: runs.len(),
        total_distance: runs.iter().map(|r| r.distance).sum(),
        unique_locations: unique.len(),
        date_range: compute_date_range(runs),
    }
}
