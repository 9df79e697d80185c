//! Best-effort date handling.
//!
//! All writers store dates in one canonical form, `YYYY-MM-DDTHH:MM:SS.mmmZ`,
//! so that exact string comparison can be used for deduplication.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Naive layouts tried after RFC 3339. Naive values are taken as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%b %d, %Y, %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a date in any of the accepted layouts.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Format an instant in the canonical millisecond UTC form.
pub fn format_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Normalize to the canonical form, or pass the raw string through if unparsable.
pub fn normalize_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(dt) => format_iso(&dt),
        None => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_rfc3339() {
        assert_eq!(
            normalize_date("2024-05-01T12:00:00Z"),
            "2024-05-01T12:00:00.000Z"
        );
        assert_eq!(
            normalize_date("2024-05-01T14:00:00+02:00"),
            "2024-05-01T12:00:00.000Z"
        );
    }

    #[test]
    fn test_normalize_export_layout() {
        assert_eq!(
            normalize_date("May 1, 2024, 12:00:00 PM"),
            "2024-05-01T12:00:00.000Z"
        );
        assert_eq!(normalize_date("2024-05-01 06:30:00"), "2024-05-01T06:30:00.000Z");
        assert_eq!(normalize_date("2024-05-01"), "2024-05-01T00:00:00.000Z");
    }

    #[test]
    fn test_unparsable_passes_through() {
        assert_eq!(normalize_date("sometime last spring"), "sometime last spring");
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_canonical_is_stable() {
        let once = normalize_date("2024-05-01T12:00:00Z");
        assert_eq!(normalize_date(&once), once);
    }
}
