//! # Geo-format extractors
//!
//! Decode coordinates from the track files found in an activity export:
//! GPX (optionally gzip-compressed) and FIT (optionally gzip-compressed).
//!
//! Every function here is total. Missing files, corrupt archives, decode
//! failures, and files without a usable fix all come back as `None` or an
//! empty track so a single bad file never aborts a batch.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use log::debug;

use crate::types::{Coordinate, LatLng};

pub mod fit;
pub mod gpx;

/// Track file formats recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoFormat {
    Gpx,
    GpxGz,
    Fit,
    FitGz,
}

impl GeoFormat {
    /// Detect the format from a file name, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".gpx.gz") {
            Some(GeoFormat::GpxGz)
        } else if name.ends_with(".fit.gz") {
            Some(GeoFormat::FitGz)
        } else if name.ends_with(".gpx") {
            Some(GeoFormat::Gpx)
        } else if name.ends_with(".fit") {
            Some(GeoFormat::Fit)
        } else {
            None
        }
    }

    pub fn is_compressed(self) -> bool {
        matches!(self, GeoFormat::GpxGz | GeoFormat::FitGz)
    }

    pub fn is_xml(self) -> bool {
        matches!(self, GeoFormat::Gpx | GeoFormat::GpxGz)
    }
}

/// Read a file fully, transparently gunzipping when `compressed`.
fn read_bytes(path: &Path, compressed: bool) -> std::io::Result<Vec<u8>> {
    let mut file = BufReader::new(File::open(path)?);
    let mut bytes = Vec::new();
    if compressed {
        GzDecoder::new(file).read_to_end(&mut bytes)?;
    } else {
        file.read_to_end(&mut bytes)?;
    }
    Ok(bytes)
}

/// First valid coordinate in a track file of any supported format.
pub fn extract_first_coordinate(path: &Path) -> Option<Coordinate> {
    let format = GeoFormat::from_path(path)?;
    let bytes = match read_bytes(path, format.is_compressed()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("[extract] Cannot read {}: {}", path.display(), e);
            return None;
        }
    };

    if format.is_xml() {
        gpx::first_point(&String::from_utf8_lossy(&bytes))
    } else {
        fit::first_point(&bytes)
    }
}

/// Every valid track point in a GPX file (plain or gzip), in file order.
///
/// FIT and unknown formats yield an empty track.
pub fn extract_track(path: &Path) -> Vec<LatLng> {
    let Some(format) = GeoFormat::from_path(path).filter(|f| f.is_xml()) else {
        debug!("[extract] No track extraction for {}", path.display());
        return Vec::new();
    };

    match read_bytes(path, format.is_compressed()) {
        Ok(bytes) => gpx::all_points(&String::from_utf8_lossy(&bytes))
            .into_iter()
            .map(Coordinate::to_lat_lng)
            .collect(),
        Err(e) => {
            debug!("[extract] Cannot read {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
