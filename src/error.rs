//! Unified error handling for the run-location pipeline.
//!
//! Only the writers (exporter, updater) and the validator surface these errors.
//! Extractors and the runtime reader degrade to "no data" instead.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Unified error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A top-level export file the exporter cannot run without
    #[error("Required export file not found: {}", path.display())]
    MissingExportFile { path: PathBuf },

    /// No candidate cache location held a usable artifact
    #[error(
        "No valid existing cache found (tried: {}). Run runmap-export first to build the initial cache",
        display_paths(tried)
    )]
    NoValidCache { tried: Vec<PathBuf> },

    /// A credential required by the remote API is not set
    #[error("Missing credential: {name} is not set")]
    MissingCredential { name: String },

    /// HTTP/API error
    #[error("HTTP error{}: {message}", status_suffix(*status_code))]
    Http {
        message: String,
        status_code: Option<u16>,
    },

    /// Token exchange rejected
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Filesystem error tied to a path
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization error tied to a path
    #[error("JSON error at {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Artifact shape violation found by the validator
    #[error("Validation failed: {message}")]
    Validation { message: String },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn status_suffix(status_code: Option<u16>) -> String {
    status_code.map(|c| format!(" ({})", c)).unwrap_or_default()
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for attaching a path to I/O failures.
pub trait IoResultExt<T> {
    fn with_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: &Path) -> Result<T> {
        self.map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::Http {
            message: "Too many requests".to_string(),
            status_code: Some(429),
        };
        assert_eq!(err.to_string(), "HTTP error (429): Too many requests");

        let err = PipelineError::Http {
            message: "connection reset".to_string(),
            status_code: None,
        };
        assert_eq!(err.to_string(), "HTTP error: connection reset");
    }

    #[test]
    fn test_no_valid_cache_lists_paths() {
        let err = PipelineError::NoValidCache {
            tried: vec![PathBuf::from("a.json"), PathBuf::from("b.json")],
        };
        let msg = err.to_string();
        assert!(msg.contains("a.json, b.json"));
        assert!(msg.contains("runmap-export"));
    }

    #[test]
    fn test_io_result_ext() {
        let io: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let result = io.with_path(Path::new("missing.csv"));
        assert!(matches!(result, Err(PipelineError::Io { ref path, .. }) if path == Path::new("missing.csv")));
    }
}
