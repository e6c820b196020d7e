use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::types::MotionSample;

pub const TRACE_VERSION: u32 = 1;

/// Persisted per-session enrichment. Leaves room for fields beyond the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    pub version: u32,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scenario_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date_played: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mouse_trace: Vec<MotionSample>,
}

/// Stores one JSON document per session file under a configurable directory.
///
/// The directory can be swapped at runtime; files already written stay where
/// they are.
pub struct TraceStore {
    base_dir: RwLock<Option<PathBuf>>,
}

impl TraceStore {
    /// Store rooted at the default traces directory (`~/.refleks/traces`).
    pub fn new() -> Self {
        Self {
            base_dir: RwLock::new(None),
        }
    }

    /// Store rooted at a custom directory (useful for testing).
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: RwLock::new(Some(dir.into())),
        }
    }

    /// Point the store at a new directory. Blank resets to the default.
    pub fn set_base_dir(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        let mut guard = self.base_dir.write();
        *guard = if dir.as_os_str().is_empty() {
            None
        } else {
            Some(dir)
        };
    }

    /// Currently configured directory, falling back to the default.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.base_dir
            .read()
            .clone()
            .or_else(crate::default_traces_dir)
    }

    /// Write a trace document, always as version 1, replacing any existing file.
    pub fn save(&self, record: &TraceRecord) -> Result<PathBuf, TraceError> {
        let path = self.path_for(&record.file_name)?;
        let mut record = record.clone();
        record.version = TRACE_VERSION;
        let data = serde_json::to_string_pretty(&record)?;
        fs::write(&path, data).map_err(|source| TraceError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Load the trace document for a session file name.
    pub fn load(&self, file_name: &str) -> Result<TraceRecord, TraceError> {
        let path = self.path_for(file_name)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TraceError::NotFound(path))
            }
            Err(source) => return Err(TraceError::Io { path, source }),
        };
        serde_json::from_str(&raw).map_err(|source| TraceError::Decode { path, source })
    }

    /// Whether a trace document exists for a session file name. Does not decode it.
    pub fn exists(&self, file_name: &str) -> bool {
        self.path_for(file_name)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Full JSON path for a session file name; creates the directory on demand.
    pub fn path_for(&self, file_name: &str) -> Result<PathBuf, TraceError> {
        let dir = self.base_dir().ok_or(TraceError::NoBaseDir)?;
        fs::create_dir_all(&dir).map_err(|source| TraceError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir.join(trace_file_name(file_name)))
    }
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a session file name to its trace file name: base name only, path
/// separators replaced, ` Stats.csv` / `.csv` rewritten to `.json`.
pub fn trace_file_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let stem = base.replace(['/', '\\'], "_");

    let lower = stem.to_ascii_lowercase();
    if lower.ends_with(" stats.csv") {
        format!("{}.json", &stem[..stem.len() - " stats.csv".len()])
    } else if lower.ends_with(".csv") {
        format!("{}.json", &stem[..stem.len() - ".csv".len()])
    } else if lower.ends_with(".json") {
        stem
    } else {
        format!("{stem}.json")
    }
}
