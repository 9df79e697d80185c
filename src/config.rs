//! Pipeline configuration.
//!
//! Every path, column name, and endpoint the pipeline touches lives here.
//! Values come from `Default` and may be overridden by a TOML file, then by
//! command-line flags in each binary.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::simplify::DEFAULT_MAX_ROUTE_POINTS;

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub export: ExportConfig,
    pub strava: StravaConfig,
}

/// Filesystem layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Unpacked bulk export (holds the activity table, track files, media)
    pub export_dir: PathBuf,
    /// Primary cache artifact
    pub cache_path: PathBuf,
    /// Public-serving copy of the artifact
    pub public_cache_path: PathBuf,
    /// Public web root; media lands in `public_dir/media_dir_name`
    pub public_dir: PathBuf,
    /// Media directory name, also the required prefix of every stored media path
    pub media_dir_name: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("strava-export"),
            cache_path: PathBuf::from("data/runs-cache.json"),
            public_cache_path: PathBuf::from("public/data/runs-cache.json"),
            public_dir: PathBuf::from("public"),
            media_dir_name: "run-media".to_string(),
        }
    }
}

/// A column picked by header name. `occurrence` selects among duplicate
/// headers (zero-based); when that occurrence is absent the first one is used.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColumnRef {
    pub header: String,
    pub occurrence: usize,
}

impl ColumnRef {
    pub fn named(header: &str) -> Self {
        Self {
            header: header.to_string(),
            occurrence: 0,
        }
    }
}

impl Default for ColumnRef {
    fn default() -> Self {
        Self::named("")
    }
}

/// Column names in the export tables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub activity_type: ColumnRef,
    pub name: ColumnRef,
    pub date: ColumnRef,
    /// Export tables carry two "Distance" columns. The second one is meters.
    pub distance: ColumnRef,
    pub moving_time: ColumnRef,
    pub filename: ColumnRef,
    pub media: ColumnRef,
    pub gear: ColumnRef,
    pub route_name: ColumnRef,
    pub route_file: ColumnRef,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            activity_type: ColumnRef::named("Activity Type"),
            name: ColumnRef::named("Activity Name"),
            date: ColumnRef::named("Activity Date"),
            distance: ColumnRef {
                header: "Distance".to_string(),
                occurrence: 1,
            },
            moving_time: ColumnRef::named("Moving Time"),
            filename: ColumnRef::named("Filename"),
            media: ColumnRef::named("Media"),
            gear: ColumnRef::named("Activity Gear"),
            route_name: ColumnRef::named("Route Name"),
            route_file: ColumnRef::named("Route Filename"),
        }
    }
}

/// Batch exporter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Activity table, relative to `export_dir`
    pub activities_file: String,
    /// Route table, relative to `export_dir` (optional at run time)
    pub routes_file: String,
    /// Media source directory, relative to `export_dir`
    pub media_source_dir: String,
    /// Activity type value that marks a run
    pub run_activity_type: String,
    pub max_route_points: usize,
    pub columns: ColumnMap,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            activities_file: "activities.csv".to_string(),
            routes_file: "routes.csv".to_string(),
            media_source_dir: "media".to_string(),
            run_activity_type: "Run".to_string(),
            max_route_points: DEFAULT_MAX_ROUTE_POINTS,
            columns: ColumnMap::default(),
        }
    }
}

/// Remote activity API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StravaConfig {
    pub token_url: String,
    pub api_base_url: String,
    pub per_page: u32,
    /// Safety cap on paged fetches
    pub max_pages: u32,
    /// Refresh the access token when it expires within this many seconds
    pub refresh_margin_secs: i64,
    pub request_timeout_secs: u64,
}

impl Default for StravaConfig {
    fn default() -> Self {
        Self {
            token_url: "https://www.strava.com/oauth/token".to_string(),
            api_base_url: "https://www.strava.com/api/v3".to_string(),
            per_page: 200,
            max_pages: 50,
            refresh_margin_secs: 300,
            request_timeout_secs: 30,
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_toml(&text)
    }

    /// Parse TOML; missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PipelineError::Config {
            message: e.to_string(),
        })
    }

    /// Candidate artifact locations in read order.
    pub fn cache_candidates(&self) -> Vec<PathBuf> {
        vec![
            self.paths.cache_path.clone(),
            self.paths.public_cache_path.clone(),
        ]
    }

    /// Media directory name without leading or trailing slashes.
    pub fn media_dir_name(&self) -> &str {
        self.paths.media_dir_name.trim_matches('/')
    }

    /// Directory media files are copied into.
    pub fn public_media_dir(&self) -> PathBuf {
        self.paths.public_dir.join(self.media_dir_name())
    }

    pub fn activities_path(&self) -> PathBuf {
        self.paths.export_dir.join(&self.export.activities_file)
    }

    pub fn routes_path(&self) -> PathBuf {
        self.paths.export_dir.join(&self.export.routes_file)
    }

    pub fn media_source_dir(&self) -> PathBuf {
        self.paths.export_dir.join(&self.export.media_source_dir)
    }
}
