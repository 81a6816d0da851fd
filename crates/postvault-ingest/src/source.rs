//! Raw record source: JSON files dropped by the scraper.
//!
//! A file holds either a top-level array of post payloads or a single
//! payload object. Unreadable or malformed files are reported per-file and
//! never abort the load.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::IngestError;

/// One raw post payload plus where it came from.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub value: Value,
    /// Provenance, typically the source file path.
    pub source_reference: Option<String>,
}

impl RawRecord {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            source_reference: None,
        }
    }
}

/// A file that could not be loaded, with the reason.
#[derive(Debug, Clone)]
pub struct FileError {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of scanning a directory of scraped JSON files.
#[derive(Debug, Default)]
pub struct LoadedBatch {
    pub records: Vec<RawRecord>,
    pub file_errors: Vec<FileError>,
}

/// Load every `*.json` file under `dir` into raw records.
///
/// Files are visited in sorted order so repeated imports are deterministic.
///
/// # Errors
///
/// Returns [`IngestError::Source`] only if the directory itself cannot be
/// read; individual file failures land in [`LoadedBatch::file_errors`].
pub fn load_directory(dir: &Path) -> Result<LoadedBatch, IngestError> {
    let entries = std::fs::read_dir(dir).map_err(|source| IngestError::Source {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut batch = LoadedBatch::default();

    for path in paths {
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read file");
                batch.file_errors.push(FileError {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let parsed: Value = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not parse JSON");
                batch.file_errors.push(FileError {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let source_reference = Some(path.display().to_string());
        match parsed {
            Value::Array(values) => {
                for value in values {
                    batch.records.push(RawRecord {
                        value,
                        source_reference: source_reference.clone(),
                    });
                }
            }
            Value::Object(_) => {
                batch.records.push(RawRecord {
                    value: parsed,
                    source_reference,
                });
            }
            other => {
                tracing::warn!(
                    path = %path.display(),
                    "expected a JSON array or object, got {}",
                    type_name(&other)
                );
                batch.file_errors.push(FileError {
                    path,
                    reason: format!("expected a JSON array or object, got {}", type_name(&other)),
                });
            }
        }
    }

    Ok(batch)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
