//! Settings file support for refleks.
//!
//! Loads `refleks.toml` from `--config` or `~/.refleks/refleks.toml`.

use anyhow::{Context, Result};
use refleks_sessions::{
    default_config_dir, default_traces_dir, WatcherConfig, DEFAULT_MAX_EXISTING_ON_START,
    DEFAULT_MOUSE_BUFFER_MINUTES, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SESSION_GAP_MINUTES,
    TRACES_SUBDIR_NAME,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The config file name
pub const CONFIG_FILE_NAME: &str = "refleks.toml";

/// Overrides the stats directory when none is configured
pub const ENV_STATS_DIR: &str = "REFLEKS_STATS_DIR";

/// Where the trainer writes session logs on a default Windows Steam install
pub const DEFAULT_WINDOWS_STATS_DIR: &str =
    r"C:\Program Files (x86)\Steam\steamapps\common\FPSAimTrainer\FPSAimTrainer\stats";

/// User settings loaded from `refleks.toml`. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory the trainer writes session logs to
    pub stats_dir: PathBuf,
    /// Directory for persisted motion traces
    pub traces_dir: PathBuf,
    pub session_gap_minutes: u64,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub parse_existing_on_start: bool,
    /// Newest existing files to parse on start; older ones are skipped
    pub max_existing_on_start: usize,
    pub mouse_tracking_enabled: bool,
    /// Motion sample retention
    pub mouse_buffer_minutes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stats_dir: default_stats_dir(),
            traces_dir: traces_dir_or_relative(),
            session_gap_minutes: DEFAULT_SESSION_GAP_MINUTES,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            parse_existing_on_start: true,
            max_existing_on_start: DEFAULT_MAX_EXISTING_ON_START,
            mouse_tracking_enabled: false,
            mouse_buffer_minutes: DEFAULT_MOUSE_BUFFER_MINUTES,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// Returns:
    /// - defaults if the default file does not exist
    /// - `Err(...)` if an explicitly given file does not exist
    /// - `Err(...)` if the file exists but fails to parse (hard error)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("Config file {} does not exist", p.display());
                }
                p.to_path_buf()
            }
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings.sanitize())
    }

    /// Replace zero or empty values with defaults.
    pub fn sanitize(mut self) -> Self {
        if self.stats_dir.as_os_str().is_empty() {
            self.stats_dir = default_stats_dir();
        }
        if self.traces_dir.to_string_lossy().trim().is_empty() {
            self.traces_dir = traces_dir_or_relative();
        }
        if self.session_gap_minutes == 0 {
            self.session_gap_minutes = DEFAULT_SESSION_GAP_MINUTES;
        }
        if self.poll_interval.is_zero() {
            self.poll_interval = Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS);
        }
        if self.mouse_buffer_minutes == 0 {
            self.mouse_buffer_minutes = DEFAULT_MOUSE_BUFFER_MINUTES;
        }
        if self.max_existing_on_start == 0 {
            self.max_existing_on_start = DEFAULT_MAX_EXISTING_ON_START;
        }
        self
    }

    pub fn mouse_buffer(&self) -> Duration {
        Duration::from_secs(self.mouse_buffer_minutes * 60)
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig::new(&self.stats_dir)
            .with_poll_interval(self.poll_interval)
            .with_session_gap(Duration::from_secs(self.session_gap_minutes * 60))
            .with_parse_existing(self.parse_existing_on_start, self.max_existing_on_start)
    }
}

/// Command-line values that win over the settings file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub stats_dir: Option<PathBuf>,
    pub traces_dir: Option<PathBuf>,
    pub poll_interval: Option<Duration>,
    pub max_existing_on_start: Option<usize>,
    pub no_parse_existing: bool,
    pub mouse_tracking: bool,
}

impl Overrides {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(ref dir) = self.stats_dir {
            settings.stats_dir = dir.clone();
        }
        if let Some(ref dir) = self.traces_dir {
            settings.traces_dir = dir.clone();
        }
        if let Some(interval) = self.poll_interval {
            settings.poll_interval = interval;
        }
        if let Some(limit) = self.max_existing_on_start {
            settings.max_existing_on_start = limit;
        }
        if self.no_parse_existing {
            settings.parse_existing_on_start = false;
        }
        if self.mouse_tracking {
            settings.mouse_tracking_enabled = true;
        }
    }

    /// Load the settings file, apply these overrides and sanitize.
    pub fn load(&self, config: Option<&Path>) -> Result<Settings> {
        let mut settings = Settings::load(config)?;
        self.apply(&mut settings);
        Ok(settings.sanitize())
    }
}

/// `~/.refleks/refleks.toml`
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Stats directory from the environment, else the platform default (empty off Windows).
pub fn default_stats_dir() -> PathBuf {
    stats_dir_from_env(std::env::var(ENV_STATS_DIR).ok())
}

fn stats_dir_from_env(env: Option<String>) -> PathBuf {
    if let Some(dir) = env.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return PathBuf::from(dir);
    }
    if cfg!(windows) {
        PathBuf::from(DEFAULT_WINDOWS_STATS_DIR)
    } else {
        PathBuf::new()
    }
}

fn traces_dir_or_relative() -> PathBuf {
    default_traces_dir().unwrap_or_else(|| PathBuf::from(TRACES_SUBDIR_NAME))
}
