//! Artifact persistence for the writers.
//!
//! Writes go to a temporary file in the destination directory and are renamed
//! into place, so a reader never observes a half-written artifact.

use std::io::Write;
use std::path::Path;

use log::info;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::{IoResultExt, PipelineError, Result};
use crate::types::CacheArtifact;

/// Serialize and atomically replace the artifact at `path`.
pub fn write_artifact(path: &Path, artifact: &CacheArtifact) -> Result<()> {
    let json = serde_json::to_string_pretty(artifact).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_path(dir)?;

    let mut tmp = NamedTempFile::new_in(dir).with_path(dir)?;
    tmp.write_all(json.as_bytes()).with_path(tmp.path())?;
    tmp.write_all(b"\n").with_path(tmp.path())?;
    tmp.as_file().sync_all().with_path(tmp.path())?;
    tmp.persist(path).map_err(|e| PipelineError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    info!(
        "[store] Wrote {} runs, {} routes to {}",
        artifact.runs.len(),
        artifact.routes.len(),
        path.display()
    );
    Ok(())
}

/// Read and parse a JSON document.
pub fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).with_path(path)?;
    serde_json::from_str(&text).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })
}
