use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Announcements rendered for the user while watching a stats directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    WatcherStarted {
        path: PathBuf,
        traces_dir: Option<PathBuf>,
        mouse_tracking: bool,
    },
    RecordAdded {
        file_name: String,
        scenario: String,
        accuracy: f64,
        real_avg_ttk: Option<f64>,
        score: Option<f64>,
        trace_samples: usize,
    },
    RecordUpdated {
        file_name: String,
        trace_samples: usize,
    },
    ErrorEncountered {
        error: String,
    },
    WatcherStopped,
}

impl LogEvent {
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Output format for both `tracing` and announcements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored
    #[default]
    Pretty,
    /// JSON lines
    Json,
    /// One short line per event
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Renders [`LogEvent`]s to stderr and, optionally, appends them to a JSONL file.
pub struct EventLog {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl EventLog {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Also append every event, timestamped, to `log_path`.
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn log(&self, event: &LogEvent) {
        // file output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        let mut stderr = std::io::stderr();
        let line = self.render(event);
        if !line.is_empty() {
            let _ = writeln!(stderr, "{}", line);
        }
    }

    /// Console text for one event in the configured format.
    pub fn render(&self, event: &LogEvent) -> String {
        match self.format {
            LogFormat::Json => serde_json::to_string(event).unwrap_or_default(),
            LogFormat::Pretty => Self::render_pretty(event),
            LogFormat::Compact => Self::render_compact(event),
        }
    }

    fn render_pretty(event: &LogEvent) -> String {
        match event {
            LogEvent::WatcherStarted {
                path,
                traces_dir,
                mouse_tracking,
            } => {
                let traces = traces_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string());
                let tracking = if *mouse_tracking {
                    "on".bright_green()
                } else {
                    "off".dimmed()
                };
                format!(
                    "{} {} {}\n  {} {}\n  {} {}",
                    "▶".bright_blue(),
                    "Watching".bold().bright_white(),
                    path.display().to_string().bright_white(),
                    "Traces:".dimmed(),
                    traces.dimmed(),
                    "Mouse tracking:".dimmed(),
                    tracking
                )
            }
            LogEvent::RecordAdded {
                scenario,
                accuracy,
                real_avg_ttk,
                score,
                trace_samples,
                ..
            } => {
                let acc = format!("{:.1}%", accuracy * 100.0);
                let acc = if *accuracy >= 0.9 {
                    acc.bright_green()
                } else if *accuracy >= 0.7 {
                    acc.bright_yellow()
                } else {
                    acc.bright_red()
                };
                let mut line = format!(
                    "  {} {}  {} {}",
                    "✓".bright_green(),
                    Self::truncate(scenario, 40).bold(),
                    "acc".dimmed(),
                    acc
                );
                if let Some(ttk) = real_avg_ttk {
                    line.push_str(&format!("  {} {:.3}s", "ttk".dimmed(), ttk));
                }
                if let Some(score) = score {
                    line.push_str(&format!("  {} {:.1}", "score".dimmed(), score));
                }
                if *trace_samples > 0 {
                    line.push_str(&format!(
                        "  {}",
                        format!("{} samples", trace_samples).bright_cyan()
                    ));
                }
                line
            }
            LogEvent::RecordUpdated {
                file_name,
                trace_samples,
            } => format!(
                "  {} {} {}",
                "↻".bright_cyan(),
                Self::truncate(file_name, 60).dimmed(),
                format!("({} samples)", trace_samples).bright_cyan()
            ),
            LogEvent::ErrorEncountered { error } => {
                format!("{} {}", "✗".bright_red(), error.bright_red())
            }
            LogEvent::WatcherStopped => format!("{} {}", "■".bright_blue(), "Stopped".dimmed()),
        }
    }

    fn render_compact(event: &LogEvent) -> String {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        match event {
            LogEvent::WatcherStarted { path, .. } => {
                format!("[{}] watch:start {}", timestamp, path.display())
            }
            LogEvent::RecordAdded {
                file_name,
                accuracy,
                trace_samples,
                ..
            } => format!(
                "[{}] record:add {} acc={:.3} samples={}",
                timestamp, file_name, accuracy, trace_samples
            ),
            LogEvent::RecordUpdated {
                file_name,
                trace_samples,
            } => format!(
                "[{}] record:update {} samples={}",
                timestamp, file_name, trace_samples
            ),
            LogEvent::ErrorEncountered { error } => format!("[{}] error {}", timestamp, error),
            LogEvent::WatcherStopped => format!("[{}] watch:stop", timestamp),
        }
    }

    fn truncate(s: &str, max_chars: usize) -> String {
        if s.chars().count() <= max_chars {
            s.to_string()
        } else {
            let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{}...", cut)
        }
    }
}
