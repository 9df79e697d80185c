//! FIT decoding via `fitparser`.
//!
//! Positions are stored as semicircles: signed 32-bit integers spanning
//! [-2^31, 2^31) for [-180°, 180°).

use fitparser::{FitDataRecord, Value};
use log::debug;

use crate::types::Coordinate;

/// Degrees per semicircle (180 / 2^31).
const SEMICIRCLE_TO_DEGREES: f64 = 180.0 / 2_147_483_648.0;

/// Convert a semicircle angle to degrees.
pub fn semicircles_to_degrees(semicircles: f64) -> f64 {
    semicircles * SEMICIRCLE_TO_DEGREES
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::SInt32(v) => Some(*v as f64),
        Value::UInt32(v) => Some(*v as f64),
        Value::SInt64(v) => Some(*v as f64),
        Value::SInt16(v) => Some(*v as f64),
        Value::Float32(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        _ => None,
    }
}

/// Raw `(position_lat, position_long)` semicircle values of one record.
fn position(record: &FitDataRecord) -> (Option<f64>, Option<f64>) {
    let mut lat = None;
    let mut lng = None;
    for field in record.fields() {
        match field.name() {
            "position_lat" => lat = numeric(field.value()),
            "position_long" => lng = numeric(field.value()),
            _ => {}
        }
    }
    (lat, lng)
}

/// First pair where both values are present, non-zero, and convert to a valid fix.
pub fn first_valid_fix<I>(positions: I) -> Option<Coordinate>
where
    I: IntoIterator<Item = (Option<f64>, Option<f64>)>,
{
    positions.into_iter().find_map(|pair| match pair {
        (Some(lat), Some(lng)) if lat != 0.0 && lng != 0.0 => {
            let coord = Coordinate::new(semicircles_to_degrees(lat), semicircles_to_degrees(lng));
            coord.is_valid().then_some(coord)
        }
        _ => None,
    })
}

/// First valid coordinate in an already-decompressed FIT file.
pub fn first_point(bytes: &[u8]) -> Option<Coordinate> {
    let mut reader = bytes;
    let records = match fitparser::from_reader(&mut reader) {
        Ok(records) => records,
        Err(e) => {
            debug!("[extract] FIT decode failed: {}", e);
            return None;
        }
    };
    first_valid_fix(records.iter().map(position))
}

/// Minimal FIT file: a header, one record definition (global message 20,
/// `position_lat` and `position_long` as sint32), one data message per
/// semicircle pair, and the trailing CRC.
#[cfg(test)]
pub(crate) fn encode_positions(positions: &[(i32, i32)]) -> Vec<u8> {
    // CRC-16/ARC, as used for FIT header and file checksums
    fn crc16(bytes: &[u8]) -> u16 {
        bytes.iter().fold(0u16, |mut crc, &b| {
            crc ^= b as u16;
            for _ in 0..8 {
                crc = if crc & 1 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
            }
            crc
        })
    }

    let mut data = vec![
        0x40, // definition, local message 0
        0x00, // reserved
        0x00, // little endian
        20, 0, // global message: record
        2, // field count
        0, 4, 0x85, // position_lat, 4 bytes, sint32
        1, 4, 0x85, // position_long, 4 bytes, sint32
    ];
    for (lat, lng) in positions {
        data.push(0x00);
        data.extend_from_slice(&lat.to_le_bytes());
        data.extend_from_slice(&lng.to_le_bytes());
    }

    let mut file = vec![14, 0x10];
    file.extend_from_slice(&2093u16.to_le_bytes());
    file.extend_from_slice(&(data.len() as u32).to_le_bytes());
    file.extend_from_slice(b".FIT");
    let header_crc = crc16(&file);
    file.extend_from_slice(&header_crc.to_le_bytes());
    file.extend_from_slice(&data);
    let file_crc = crc16(&file);
    file.extend_from_slice(&file_crc.to_le_bytes());
    file
}
