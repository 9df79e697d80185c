//! Fixed-stride route simplification.
//!
//! Route payloads are bounded by keeping every `step`-th point. The final point
//! is always kept exactly so the drawn route ends where the original did.

use crate::types::LatLng;

/// Default maximum points kept per route.
pub const DEFAULT_MAX_ROUTE_POINTS: usize = 200;

/// Downsample `points` to at most `max_points`, retaining the last point.
///
/// Inputs at or under the limit are returned unchanged, which makes the
/// operation idempotent. Limits below 2 are treated as 2.
///
/// # Example
/// ```
/// use runmap::simplify::simplify_route;
///
/// let track: Vec<[f64; 2]> = (0..1000).map(|i| [i as f64 * 0.001, 0.5]).collect();
/// let simplified = simplify_route(&track, 200);
/// assert!(simplified.len() <= 200);
/// assert_eq!(simplified.last(), track.last());
/// ```
pub fn simplify_route(points: &[LatLng], max_points: usize) -> Vec<LatLng> {
    let max_points = max_points.max(2);
    let len = points.len();
    if len <= max_points {
        return points.to_vec();
    }

    // ceil((len - 1) / (max_points - 1)) leaves room for the final point
    let step = (len - 1).div_ceil(max_points - 1);
    let last = len - 1;

    let mut result: Vec<LatLng> = (0..last).step_by(step).map(|i| points[i]).collect();
    result.push(points[last]);
    result
}
