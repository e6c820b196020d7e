use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use refleks_logging::LogEvent;
use refleks_sessions::metrics::{KEY_ACCURACY, KEY_REAL_AVG_TTK};
use refleks_sessions::{
    parse_filename, DirectoryWatcher, MotionBuffer, SampleProvider, SessionRecord, TraceStore,
    WatcherEvent,
};

use crate::config::Settings;

/// Owns the trace store, the motion buffer and the watcher for one process.
pub struct App {
    settings: Settings,
    traces: Arc<TraceStore>,
    motion: Arc<MotionBuffer>,
    provider: Arc<dyn SampleProvider>,
    watcher: DirectoryWatcher,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let settings = settings.sanitize();
        let traces = Arc::new(TraceStore::with_dir(&settings.traces_dir));
        let motion = Arc::new(MotionBuffer::new(settings.mouse_buffer()));
        if settings.mouse_tracking_enabled {
            motion.start();
        }
        let provider: Arc<dyn SampleProvider> = motion.clone();

        let watcher = DirectoryWatcher::new(settings.watcher_config(), Arc::clone(&traces));
        watcher.set_sample_provider(&provider);

        Self {
            settings,
            traces,
            motion,
            provider,
            watcher,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn watcher(&self) -> &DirectoryWatcher {
        &self.watcher
    }

    /// Buffer an external input driver feeds with relative motion.
    pub fn motion(&self) -> &Arc<MotionBuffer> {
        &self.motion
    }

    pub async fn start(&self) -> Result<()> {
        self.watcher.start().await?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        self.watcher.stop().await?;
        self.motion.stop();
        Ok(())
    }

    /// Switch to new settings at runtime.
    ///
    /// A running watcher is restarted with the new configuration and an empty
    /// seen-set, so existing files are announced again. Returns how many
    /// records picked up a trace from a changed traces directory.
    pub async fn apply_settings(&mut self, new: Settings) -> Result<usize> {
        let new = new.sanitize();
        let previous_traces = self.traces.base_dir();

        self.motion.set_buffer_duration(new.mouse_buffer());
        if new.mouse_tracking_enabled {
            self.motion.start();
        } else {
            self.motion.stop();
        }

        if self.watcher.is_running() {
            self.watcher.stop().await?;
            self.watcher.update_config(new.watcher_config())?;
            self.watcher.clear();
            self.watcher.set_sample_provider(&self.provider);
            self.watcher.start().await?;
        } else {
            self.watcher.update_config(new.watcher_config())?;
            self.watcher.clear();
            self.watcher.set_sample_provider(&self.provider);
        }

        self.traces.set_base_dir(&new.traces_dir);
        let mut reloaded = 0;
        if self.traces.base_dir() != previous_traces {
            reloaded = self.watcher.reload_traces();
            info!(
                traces_dir = %new.traces_dir.display(),
                reloaded,
                "traces directory changed"
            );
        }

        self.settings = new;
        Ok(reloaded)
    }

    /// User-facing announcement for a watcher event.
    pub fn log_event(&self, event: &WatcherEvent) -> LogEvent {
        match event {
            WatcherEvent::WatcherStarted { path } => LogEvent::WatcherStarted {
                path: path.clone(),
                traces_dir: self.traces.base_dir(),
                mouse_tracking: self.settings.mouse_tracking_enabled,
            },
            WatcherEvent::RecordAdded(record) => record_added(record),
            WatcherEvent::RecordUpdated(record) => LogEvent::RecordUpdated {
                file_name: record.file_name.clone(),
                trace_samples: record.mouse_trace.len(),
            },
        }
    }
}

pub fn record_added(record: &SessionRecord) -> LogEvent {
    let scenario = parse_filename(&record.file_name)
        .map(|info| info.scenario_name)
        .unwrap_or_else(|_| record.file_name.clone());
    LogEvent::RecordAdded {
        file_name: record.file_name.clone(),
        scenario,
        accuracy: record.stat(KEY_ACCURACY).map_or(0.0, |v| v.as_f64()),
        real_avg_ttk: record.stat(KEY_REAL_AVG_TTK).map(|v| v.as_f64()),
        score: record.stat("Score").map(|v| v.as_f64()),
        trace_samples: record.mouse_trace.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use refleks_sessions::{MotionSample, TraceRecord};
    use tempfile::TempDir;

    const NAME: &str = "Speed Focus - Challenge - 2025.01.02-03.04.10 Stats.csv";
    const LOG: &str = "Kill #,Timestamp,Bot\n\
                       1,03:04:05.000,BotA\n\
                       2,03:04:06.500,BotA\n\
                       Hit Count:,8\n\
                       Miss Count:,2\n\
                       Score:,99.5\n";

    fn settings(dir: &TempDir) -> Settings {
        Settings {
            stats_dir: dir.path().join("stats"),
            traces_dir: dir.path().join("traces-a"),
            poll_interval: Duration::from_secs(3600),
            ..Settings::default()
        }
    }

    fn setup() -> (TempDir, Settings) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("stats")).unwrap();
        fs::write(dir.path().join("stats").join(NAME), LOG).unwrap();
        let settings = settings(&dir);
        (dir, settings)
    }

    #[tokio::test]
    async fn test_apply_settings_while_stopped_clears_and_reconfigures() {
        let (dir, settings) = setup();
        let mut app = App::new(settings.clone());
        assert_eq!(app.watcher().scan_once().unwrap(), 1);

        let mut next = settings;
        next.max_existing_on_start = 7;
        next.mouse_tracking_enabled = true;
        assert_eq!(app.apply_settings(next).await.unwrap(), 0);

        assert!(app.watcher().recent(0).is_empty());
        assert_eq!(app.watcher().config().parse_existing_limit, 7);
        assert!(app.motion().enabled());
        assert_eq!(app.watcher().scan_once().unwrap(), 1);
        drop(dir);
    }

    #[tokio::test]
    async fn test_apply_settings_restarts_running_watcher() {
        let (_dir, settings) = setup();
        let mut app = App::new(settings.clone());
        let mut rx = app.watcher().subscribe();
        app.start().await.unwrap();

        app.apply_settings(settings).await.unwrap();
        assert!(app.watcher().is_running());

        let mut added = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, WatcherEvent::RecordAdded(_)) {
                added += 1;
            }
        }
        assert_eq!(added, 2);
        app.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_changed_traces_dir_reloads_traces() {
        let (dir, settings) = setup();
        let mut app = App::new(settings.clone());
        app.start().await.unwrap();

        let other = dir.path().join("traces-b");
        let end = parse_filename(NAME).unwrap().played_at.with_timezone(&chrono::Utc);
        TraceStore::with_dir(&other)
            .save(&TraceRecord {
                version: 1,
                file_name: NAME.to_string(),
                scenario_name: "Speed Focus".to_string(),
                date_played: String::new(),
                mouse_trace: vec![MotionSample { ts: end, x: 3, y: 4 }],
            })
            .unwrap();

        let mut next = settings;
        next.traces_dir = other;
        assert_eq!(app.apply_settings(next).await.unwrap(), 1);
        assert_eq!(app.watcher().recent(1)[0].mouse_trace.len(), 1);
        app.stop().await.unwrap();
    }

    #[test]
    fn test_record_added_announcement() {
        let (dir, settings) = setup();
        let app = App::new(settings);
        app.watcher().scan_once().unwrap();
        let record = &app.watcher().recent(1)[0];

        match app.log_event(&WatcherEvent::RecordAdded(record.clone())) {
            LogEvent::RecordAdded {
                scenario,
                accuracy,
                real_avg_ttk,
                score,
                ..
            } => {
                assert_eq!(scenario, "Speed Focus");
                assert_eq!(accuracy, 0.8);
                assert_eq!(real_avg_ttk, Some(1.5));
                assert_eq!(score, Some(99.5));
            }
            other => panic!("unexpected event {other:?}"),
        }
        drop(dir);
    }
}
