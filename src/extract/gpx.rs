//! Pattern-based GPX point scanning.
//!
//! This is a scan, not an XML parser. Precondition: points are `<trkpt>` or
//! `<rtept>` start tags whose `lat` and `lon` attributes are quoted (single or
//! double) and appear in either order inside the tag. Exporting services emit
//! exactly this shape.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Coordinate;

static POINT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:trkpt|rtept)\b([^>]*)>").expect("point tag pattern"));
static LAT_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\blat\s*=\s*["']([^"']*)["']"#).expect("lat pattern"));
static LON_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\blon\s*=\s*["']([^"']*)["']"#).expect("lon pattern"));

fn attr(pattern: &Regex, attrs: &str) -> Option<f64> {
    pattern
        .captures(attrs)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
}

fn points(xml: &str) -> impl Iterator<Item = Coordinate> + '_ {
    POINT_TAG.captures_iter(xml).filter_map(|caps| {
        let attrs = caps.get(1)?.as_str();
        let coord = Coordinate::new(attr(&LAT_ATTR, attrs)?, attr(&LON_ATTR, attrs)?);
        coord.is_valid().then_some(coord)
    })
}

/// First valid point in the document.
pub fn first_point(xml: &str) -> Option<Coordinate> {
    points(xml).next()
}

/// All valid points in document order.
pub fn all_points(xml: &str) -> Vec<Coordinate> {
    points(xml).collect()
}
