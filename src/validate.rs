//! # Offline validator
//!
//! Strict shape check of the public artifact, used as a build gate. It stops
//! at the first violation. Unlike the reader it never repairs anything.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};
use crate::store::read_json;

/// Counts reported on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub runs: usize,
    pub routes: usize,
}

fn fail<T>(message: String) -> Result<T> {
    Err(PipelineError::Validation { message })
}

fn is_finite_number(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_f64)
        .is_some_and(f64::is_finite)
}

fn require_finite(obj: &Map<String, Value>, key: &str, context: &str) -> Result<()> {
    if is_finite_number(obj.get(key)) {
        Ok(())
    } else {
        fail(format!("{} is missing a finite {}", context, key))
    }
}

fn check_run(index: usize, run: &Value) -> Result<()> {
    let context = format!("runs[{}]", index);
    let Some(obj) = run.as_object() else {
        return fail(format!("{} is not an object", context));
    };

    for key in ["lat", "lng"] {
        require_finite(obj, key, &context)?;
    }
    if !obj.get("name").is_some_and(Value::is_string) {
        return fail(format!("{} is missing a string name", context));
    }
    for key in ["distance", "moving_time"] {
        require_finite(obj, key, &context)?;
    }
    if !obj.get("media").is_some_and(Value::is_array) {
        return fail(format!("{} media is not an array", context));
    }
    Ok(())
}

fn check_route(index: usize, route: &Value) -> Result<()> {
    let context = format!("routes[{}]", index);
    let Some(obj) = route.as_object() else {
        return fail(format!("{} is not an object", context));
    };
    if !obj.get("name").is_some_and(Value::is_string) {
        return fail(format!("{} is missing a string name", context));
    }
    if !obj.get("coordinates").is_some_and(Value::is_array) {
        return fail(format!("{} coordinates is not an array", context));
    }
    Ok(())
}

fn check_stats(stats: Option<&Value>) -> Result<()> {
    let Some(obj) = stats.and_then(Value::as_object) else {
        return fail("stats is missing or not an object".to_string());
    };
    for key in ["totalRuns", "totalDistance", "uniqueLocations"] {
        require_finite(obj, key, "stats")?;
    }

    let Some(range) = obj.get("dateRange").and_then(Value::as_array) else {
        return fail("stats.dateRange is not an array".to_string());
    };
    let well_formed = range.is_empty() || (range.len() == 2 && range.iter().all(Value::is_string));
    if !well_formed {
        return fail("stats.dateRange must be empty or hold two date strings".to_string());
    }
    Ok(())
}

/// Validate a parsed artifact, stopping at the first violation.
pub fn validate_value(value: &Value) -> Result<ValidationReport> {
    let Some(root) = value.as_object() else {
        return fail("root is not an object".to_string());
    };

    let Some(runs) = root.get("runs").and_then(Value::as_array) else {
        return fail("runs is not an array".to_string());
    };
    let Some(routes) = root.get("routes").and_then(Value::as_array) else {
        return fail("routes is not an array".to_string());
    };

    for (i, run) in runs.iter().enumerate() {
        check_run(i, run)?;
    }
    for (i, route) in routes.iter().enumerate() {
        check_route(i, route)?;
    }
    check_stats(root.get("stats"))?;

    Ok(ValidationReport {
        runs: runs.len(),
        routes: routes.len(),
    })
}

/// Read, parse, and validate an artifact file.
pub fn validate_file(path: &Path) -> Result<ValidationReport> {
    let value = read_json(path)?;
    validate_value(&value)
}
