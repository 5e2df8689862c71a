//! Telemetry source over the on-disk cache: one directory per series
//! holding `*.jsonl` event files and an `end_state.json` snapshot.
//!
//! A series with only one of the two artefacts is served with the other one
//! empty; a series with neither is not ready.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_json::Value;
use tacscout_core::{SourceError, TelemetrySource};

pub const END_STATE_FILE: &str = "end_state.json";
const EVENT_EXTENSION: &str = "jsonl";

#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Series ids with a cache directory, sorted.
    pub fn list_series(&self) -> io::Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn series_dir(&self, series_id: &str) -> Result<PathBuf, SourceError> {
        let valid = !series_id.is_empty()
            && series_id != "."
            && series_id != ".."
            && !series_id.contains(['/', '\\']);
        if !valid {
            return Err(SourceError::Unavailable {
                series_id: series_id.to_string(),
                reason: "not a valid series id".to_string(),
            });
        }
        let dir = self.root.join(series_id);
        if !dir.is_dir() {
            return Err(SourceError::Unavailable {
                series_id: series_id.to_string(),
                reason: format!("no cache directory at {}", dir.display()),
            });
        }
        Ok(dir)
    }

    fn not_ready(series_id: &str, dir: &Path) -> SourceError {
        SourceError::NotReady {
            series_id: series_id.to_string(),
            reason: format!(
                "neither .{EVENT_EXTENSION} files nor {END_STATE_FILE} under {}",
                dir.display()
            ),
        }
    }
}

impl TelemetrySource for DirectorySource {
    fn fetch_events(&self, series_id: &str) -> Result<String, SourceError> {
        let dir = self.series_dir(series_id)?;
        let files = event_files(series_id, &dir)?;
        if files.is_empty() {
            if !dir.join(END_STATE_FILE).is_file() {
                return Err(Self::not_ready(series_id, &dir));
            }
            warn!(
                "series {series_id}: no .{EVENT_EXTENSION} files under {}, using an empty archive",
                dir.display()
            );
            return Ok(String::new());
        }

        let mut archive = String::new();
        for path in &files {
            let text = fs::read_to_string(path).map_err(|err| io_failure(series_id, path, &err))?;
            archive.push_str(&text);
            if !archive.ends_with('\n') {
                archive.push('\n');
            }
        }
        debug!(
            "series {series_id}: read {} event files ({} bytes)",
            files.len(),
            archive.len()
        );
        Ok(archive)
    }

    fn fetch_end_state(&self, series_id: &str) -> Result<Value, SourceError> {
        let dir = self.series_dir(series_id)?;
        let path = dir.join(END_STATE_FILE);
        if !path.is_file() {
            if event_files(series_id, &dir)?.is_empty() {
                return Err(Self::not_ready(series_id, &dir));
            }
            warn!(
                "series {series_id}: {} is missing, using an empty end state",
                path.display()
            );
            return Ok(Value::Null);
        }
        let text = fs::read_to_string(&path).map_err(|err| io_failure(series_id, &path, &err))?;
        serde_json::from_str(&text).map_err(|err| SourceError::Unavailable {
            series_id: series_id.to_string(),
            reason: format!("{} is not valid JSON: {err}", path.display()),
        })
    }
}

fn event_files(series_id: &str, dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let mut files = Vec::new();
    collect_event_files(dir, &mut files).map_err(|err| io_failure(series_id, dir, &err))?;
    files.sort();
    Ok(files)
}

fn collect_event_files(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_event_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == EVENT_EXTENSION) {
            files.push(path);
        }
    }
    Ok(())
}

fn io_failure(series_id: &str, path: &Path, err: &io::Error) -> SourceError {
    let reason = format!("{}: {err}", path.display());
    if err.kind() == io::ErrorKind::PermissionDenied {
        SourceError::Unauthorized {
            series_id: series_id.to_string(),
            reason,
        }
    } else {
        SourceError::Unavailable {
            series_id: series_id.to_string(),
            reason,
        }
    }
}
