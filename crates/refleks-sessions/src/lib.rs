//! Ingestion of exported aim-trainer session logs.
//!
//! Parses `<Scenario> - <Mode> - <YYYY.MM.DD-HH.MM.SS> Stats.csv` files,
//! derives metrics, correlates them with buffered motion samples and keeps
//! per-session trace documents on disk.

pub mod encoding;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod motion;
pub mod parser;
pub mod traces;
pub mod types;
pub mod watcher;
pub mod window;

use std::path::PathBuf;

pub use error::{FilenameError, ParseError, TraceError, WatcherError};
pub use ingest::{ingest_file, is_session_log};
pub use metrics::augment_summary;
pub use motion::{MotionBuffer, SampleProvider};
pub use parser::{parse_filename, parse_log_file, parse_log_text, ParsedLog};
pub use traces::{trace_file_name, TraceRecord, TraceStore};
pub use types::{
    EventRow, FilenameInfo, MotionSample, SessionRecord, SessionWindow, StatValue, Summary,
    WatcherConfig, WatcherEvent,
};
pub use watcher::DirectoryWatcher;
pub use window::derive_window;

/// Records kept in memory when no parse-existing limit is configured.
pub const DEFAULT_RECENT_CAP: usize = 500;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_SESSION_GAP_MINUTES: u64 = 30;
pub const DEFAULT_MOUSE_BUFFER_MINUTES: u64 = 10;
pub const DEFAULT_MAX_EXISTING_ON_START: usize = 500;

pub const CONFIG_DIR_NAME: &str = ".refleks";
pub const TRACES_SUBDIR_NAME: &str = "traces";

/// `~/.refleks`, if a home directory can be found.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME))
}

/// `~/.refleks/traces`, if a home directory can be found.
pub fn default_traces_dir() -> Option<PathBuf> {
    default_config_dir().map(|dir| dir.join(TRACES_SUBDIR_NAME))
}
