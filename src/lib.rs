//! # Runmap
//!
//! Run-location data pipeline for an interactive run map.
//!
//! This library provides:
//! - Track extraction from GPX and FIT files (plain or gzip)
//! - A batch exporter that turns a bulk activity export into a cache artifact
//! - An incremental updater that appends new runs from the Strava API
//! - A defensive reader that normalizes the artifact at serve time
//! - A strict validator used as a build gate
//!
//! ## Quick Start
//!
//! ```no_run
//! use runmap::{Normalizer, PipelineConfig, load_artifact};
//!
//! let config = PipelineConfig::default();
//! let normalizer = Normalizer::from_config(&config).unwrap();
//! let loaded = load_artifact(&config.cache_candidates(), &normalizer);
//! println!("{} runs on the map", loaded.artifact.runs.len());
//! ```

// Unified error handling
pub mod error;
pub use error::{PipelineError, Result};

// Artifact data model
pub mod types;
pub use types::{CacheArtifact, Coordinate, LatLng, Route, RunRecord, Stats};

pub mod config;
pub use config::PipelineConfig;

pub mod dates;
pub mod stats;
pub mod simplify;
pub mod table;
pub mod store;

// GPX/FIT coordinate extraction
pub mod extract;
pub use extract::{GeoFormat, extract_first_coordinate, extract_track};

// Batch exporter
pub mod export;
pub use export::{ExportSummary, run_export};

// Strava API client
pub mod strava;
pub use strava::{ActivitySource, StravaActivity, StravaClient, StravaCredentials};

// Incremental updater
pub mod update;
pub use update::{UpdateOutcome, apply_update, load_existing};

// Runtime reader
pub mod reader;
pub use reader::{LoadedArtifact, Normalizer, load_artifact};

// Build-gate validator
pub mod validate;
pub use validate::{ValidationReport, validate_file, validate_value};

/// Initialize logging for the command-line tools.
///
/// Defaults to `info` and honours `RUST_LOG`. Safe to call more than once.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env).try_init();
}
