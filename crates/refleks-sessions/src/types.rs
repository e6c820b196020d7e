use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// One value of the key/value summary block.
///
/// Coercion order is fixed: integer, then float, then the trimmed string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl StatValue {
    /// Coerce a raw summary value. The first successful parse wins.
    pub fn coerce(raw: &str) -> Self {
        let val = raw.trim();
        if let Ok(i) = val.parse::<i64>() {
            return StatValue::Int(i);
        }
        if let Ok(f) = val.parse::<f64>() {
            return StatValue::Float(f);
        }
        StatValue::Text(val.to_string())
    }

    /// Numeric view of the value. Unparsable text reads as 0.
    pub fn as_f64(&self) -> f64 {
        match self {
            StatValue::Int(i) => *i as f64,
            StatValue::Float(f) => *f,
            StatValue::Text(s) => s.parse::<f64>().unwrap_or(0.0),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StatValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Int(i) => write!(f, "{}", i),
            StatValue::Float(v) => write!(f, "{}", v),
            StatValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Flat key/value section of a session log.
pub type Summary = BTreeMap<String, StatValue>;

/// One per-action row: ordered string fields, field 0 an index, field 1 a time of day.
pub type EventRow = Vec<String>;

/// Scenario name and played-at time recovered from a session log file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameInfo {
    pub scenario_name: String,
    pub played_at: DateTime<Local>,
}

/// A single position reading in the unbounded virtual coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionSample {
    pub ts: DateTime<Utc>,
    pub x: i32,
    pub y: i32,
}

/// A parsed, enriched session log. Identity is the absolute file path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub file_path: PathBuf,
    pub file_name: String,
    pub events: Vec<EventRow>,
    pub summary: Summary,
    /// Correlated motion trace. Empty when tracking was off and nothing was persisted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mouse_trace: Vec<MotionSample>,
}

impl SessionRecord {
    pub fn stat(&self, key: &str) -> Option<&StatValue> {
        self.summary.get(key)
    }
}

/// The [start, end] span a session is believed to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl SessionWindow {
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// Runtime configuration for the directory watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    pub path: PathBuf,
    pub poll_interval: Duration,
    /// Reserved for session-level grouping; carried but not computed here.
    pub session_gap: Duration,
    pub parse_existing_on_start: bool,
    /// 0 means no limit.
    pub parse_existing_limit: usize,
}

impl WatcherConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: Duration::from_secs(crate::DEFAULT_POLL_INTERVAL_SECS),
            session_gap: Duration::from_secs(crate::DEFAULT_SESSION_GAP_MINUTES * 60),
            parse_existing_on_start: true,
            parse_existing_limit: 0,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_session_gap(mut self, gap: Duration) -> Self {
        self.session_gap = gap;
        self
    }

    pub fn with_parse_existing(mut self, enabled: bool, limit: usize) -> Self {
        self.parse_existing_on_start = enabled;
        self.parse_existing_limit = limit;
        self
    }

    /// Capacity of the recent-records buffer.
    pub fn recent_cap(&self) -> usize {
        if self.parse_existing_limit > 0 {
            self.parse_existing_limit
        } else {
            crate::DEFAULT_RECENT_CAP
        }
    }
}

/// Announcements emitted by the watcher.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum WatcherEvent {
    WatcherStarted { path: PathBuf },
    RecordAdded(SessionRecord),
    RecordUpdated(SessionRecord),
}
