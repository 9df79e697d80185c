//! # Batch exporter
//!
//! One-shot conversion of a bulk activity export into the cache artifact:
//!
//! 1. Parse the activity table and keep run rows
//! 2. Extract the first fix from each run's track file
//! 3. Build [`RunRecord`]s with lenient field coercion
//! 4. Extract and simplify routes from the optional route table
//! 5. Copy referenced media into the public media directory
//! 6. Compute stats and write the artifact to the primary cache path
//!
//! Only a missing activity table is fatal. Everything else is counted in
//! [`ExportSummary`] and skipped.

use std::path::Path;
use std::time::Instant;

use log::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::dates::normalize_date;
use crate::error::{IoResultExt, PipelineError, Result};
use crate::extract::{GeoFormat, extract_first_coordinate, extract_track};
use crate::simplify::simplify_route;
use crate::store::write_artifact;
use crate::table::{Table, field, parse_number};
use crate::types::{CacheArtifact, DEFAULT_RUN_NAME, Route, RunRecord};

/// Per-stage counts for one export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub activities_scanned: usize,
    pub non_runs_skipped: usize,
    pub malformed_rows: usize,
    pub runs_without_file: usize,
    pub missing_files: usize,
    pub decode_failures: usize,
    pub runs_accepted: usize,
    pub routes_accepted: usize,
    pub routes_skipped: usize,
    pub media_copied: usize,
    pub media_already_present: usize,
    pub media_missing: usize,
}

impl ExportSummary {
    /// Per-record errors that were skipped.
    pub fn error_count(&self) -> usize {
        self.malformed_rows + self.missing_files + self.decode_failures
    }
}

/// Split a media sub-field into stored paths under `media_dir_name`.
///
/// The field is a quote-wrapped, `|`-delimited list of export-relative paths.
/// Only the final path component of each entry is kept.
pub fn parse_media_field(raw: &str, media_dir_name: &str) -> Vec<String> {
    raw.trim()
        .trim_matches('"')
        .split('|')
        .filter_map(|entry| {
            let entry = entry.trim().trim_matches('"');
            let file = entry.rsplit(['/', '\\']).next()?.trim();
            if file.is_empty() || file == "." || file == ".." {
                return None;
            }
            Some(format!("{}/{}", media_dir_name, file))
        })
        .collect()
}

/// Column indices resolved once per table.
struct ActivityColumns {
    activity_type: Option<usize>,
    name: Option<usize>,
    date: Option<usize>,
    distance: Option<usize>,
    moving_time: Option<usize>,
    filename: Option<usize>,
    media: Option<usize>,
    gear: Option<usize>,
}

impl ActivityColumns {
    fn resolve(table: &Table, config: &PipelineConfig) -> Self {
        let c = &config.export.columns;
        Self {
            activity_type: table.column(&c.activity_type),
            name: table.column(&c.name),
            date: table.column(&c.date),
            distance: table.column(&c.distance),
            moving_time: table.column(&c.moving_time),
            filename: table.column(&c.filename),
            media: table.column(&c.media),
            gear: table.column(&c.gear),
        }
    }
}

/// Convert the activity table into run records, counting skips.
pub fn collect_runs(
    table: &Table,
    config: &PipelineConfig,
    summary: &mut ExportSummary,
) -> Vec<RunRecord> {
    let cols = ActivityColumns::resolve(table, config);
    if cols.activity_type.is_none() {
        warn!(
            "[export] Activity table has no '{}' column, no runs can be selected",
            config.export.columns.activity_type.header
        );
    }

    let export_dir = &config.paths.export_dir;
    let media_dir_name = config.media_dir_name();
    let mut runs = Vec::new();

    for (row_idx, row) in table.rows.iter().enumerate() {
        summary.activities_scanned += 1;

        if !table.is_well_formed(row) {
            debug!(
                "[export] Row {} has {} fields, expected {}",
                row_idx + 1,
                row.len(),
                table.header.len()
            );
            summary.malformed_rows += 1;
            continue;
        }

        if field(row, cols.activity_type) != config.export.run_activity_type {
            summary.non_runs_skipped += 1;
            continue;
        }

        let filename = field(row, cols.filename);
        if filename.is_empty() {
            summary.runs_without_file += 1;
            continue;
        }

        let geo_path = export_dir.join(filename);
        if !geo_path.is_file() {
            debug!("[export] Track file missing: {}", geo_path.display());
            summary.missing_files += 1;
            continue;
        }

        if GeoFormat::from_path(&geo_path).is_none() {
            debug!("[export] Unsupported track format: {}", geo_path.display());
            summary.decode_failures += 1;
            continue;
        }

        let Some(start) = extract_first_coordinate(&geo_path) else {
            summary.decode_failures += 1;
            continue;
        };

        let name = field(row, cols.name);
        runs.push(RunRecord {
            lat: start.lat,
            lng: start.lng,
            name: if name.is_empty() {
                DEFAULT_RUN_NAME.to_string()
            } else {
                name.to_string()
            },
            date: normalize_date(field(row, cols.date)),
            distance: parse_number(field(row, cols.distance)),
            moving_time: parse_number(field(row, cols.moving_time)),
            media: parse_media_field(field(row, cols.media), media_dir_name),
            gear: field(row, cols.gear).to_string(),
        });
        summary.runs_accepted += 1;
    }

    runs
}

/// Parse the route table and extract simplified geometry.
pub fn collect_routes(
    table: &Table,
    config: &PipelineConfig,
    summary: &mut ExportSummary,
) -> Vec<Route> {
    let c = &config.export.columns;
    let name_col = table.column(&c.route_name);
    let file_col = table.column(&c.route_file);
    let mut routes = Vec::new();

    for row in &table.rows {
        let name = field(row, name_col);
        let file = field(row, file_col);
        if name.is_empty() || file.is_empty() {
            summary.routes_skipped += 1;
            continue;
        }

        let path = config.paths.export_dir.join(file);
        let track = extract_track(&path);
        if track.len() < 2 {
            debug!(
                "[export] Route '{}' has {} usable points, skipping",
                name,
                track.len()
            );
            summary.routes_skipped += 1;
            continue;
        }

        routes.push(Route {
            name: name.to_string(),
            coordinates: simplify_route(&track, config.export.max_route_points),
        });
        summary.routes_accepted += 1;
    }

    routes
}

/// Copy every referenced media file into `dest_dir`.
///
/// Existing destinations are left alone and missing sources are skipped.
pub fn copy_media(
    runs: &[RunRecord],
    source_dir: &Path,
    dest_dir: &Path,
    summary: &mut ExportSummary,
) -> Result<()> {
    let files: Vec<&str> = runs
        .iter()
        .flat_map(|r| r.media.iter())
        .filter_map(|m| m.rsplit('/').next())
        .collect();
    if files.is_empty() {
        return Ok(());
    }

    std::fs::create_dir_all(dest_dir).with_path(dest_dir)?;

    for file in files {
        let dest = dest_dir.join(file);
        if dest.exists() {
            summary.media_already_present += 1;
            continue;
        }
        let source = source_dir.join(file);
        if !source.is_file() {
            summary.media_missing += 1;
            continue;
        }
        std::fs::copy(&source, &dest).with_path(&dest)?;
        summary.media_copied += 1;
    }
    Ok(())
}

/// Run the full export and write the primary cache artifact.
pub fn run_export(config: &PipelineConfig) -> Result<ExportSummary> {
    let start = Instant::now();
    let activities_path = config.activities_path();
    if !activities_path.is_file() {
        return Err(PipelineError::MissingExportFile {
            path: activities_path,
        });
    }

    info!("[export] Reading {}", activities_path.display());
    let text = std::fs::read_to_string(&activities_path).with_path(&activities_path)?;
    let table = Table::parse(&text);

    let mut summary = ExportSummary::default();
    let runs = collect_runs(&table, config, &mut summary);
    info!(
        "[export] {} runs from {} activities ({} missing files, {} decode failures, {} malformed rows)",
        summary.runs_accepted,
        summary.activities_scanned,
        summary.missing_files,
        summary.decode_failures,
        summary.malformed_rows
    );

    let routes_path = config.routes_path();
    let routes = match std::fs::read_to_string(&routes_path) {
        Ok(text) => collect_routes(&Table::parse(&text), config, &mut summary),
        Err(e) => {
            info!(
                "[export] No route table at {} ({}), continuing without routes",
                routes_path.display(),
                e
            );
            Vec::new()
        }
    };

    copy_media(
        &runs,
        &config.media_source_dir(),
        &config.public_media_dir(),
        &mut summary,
    )?;
    info!(
        "[export] Media: {} copied, {} already present, {} missing",
        summary.media_copied, summary.media_already_present, summary.media_missing
    );

    let artifact = CacheArtifact::from_parts(runs, routes);
    write_artifact(&config.paths.cache_path, &artifact)?;

    info!("[export] Complete in {:.2}s", start.elapsed().as_secs_f64());
    Ok(summary)
}
