use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::WatcherError;
use crate::ingest::{ingest_file, is_session_log};
use crate::motion::SampleProvider;
use crate::parser::parse_filename;
use crate::traces::TraceStore;
use crate::types::{SessionRecord, WatcherConfig, WatcherEvent};

/// How long `stop` waits for an in-flight scan before giving up on it.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

const EVENT_CHANNEL_CAPACITY: usize = 1024;

struct WatcherState {
    config: WatcherConfig,
    running: bool,
    seen: HashSet<PathBuf>,
    recent: VecDeque<SessionRecord>,
    provider: Option<Weak<dyn SampleProvider>>,
}

struct Shared {
    state: RwLock<WatcherState>,
    // held for a whole scan so concurrent scans cannot announce a file twice
    scan_lock: Mutex<()>,
    traces: Arc<TraceStore>,
    tx: broadcast::Sender<WatcherEvent>,
}

struct PollTask {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Candidate {
    path: PathBuf,
    played_at: DateTime<Local>,
}

/// Polls a stats directory for new session logs and announces each one once.
///
/// A file is "seen" only after it parsed successfully, so a file caught
/// mid-write is retried on the next tick. Announcements go to every
/// subscriber in the order the records were parsed.
pub struct DirectoryWatcher {
    shared: Arc<Shared>,
    task: Mutex<Option<PollTask>>,
}

impl DirectoryWatcher {
    pub fn new(config: WatcherConfig, traces: Arc<TraceStore>) -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(WatcherState {
                    config,
                    running: false,
                    seen: HashSet::new(),
                    recent: VecDeque::new(),
                    provider: None,
                }),
                scan_lock: Mutex::new(()),
                traces,
                tx,
            }),
            task: Mutex::new(None),
        }
    }

    /// Subscribe to watcher announcements.
    pub fn subscribe(&self) -> broadcast::Receiver<WatcherEvent> {
        self.shared.tx.subscribe()
    }

    /// Begin watching. No-op if already running.
    ///
    /// Announces `WatcherStarted`, then (when enabled) parses existing files
    /// before returning, then hands off to a background poll loop.
    pub async fn start(&self) -> Result<(), WatcherError> {
        let config = {
            let mut state = self.shared.state.write();
            if state.running {
                return Ok(());
            }
            state.running = true;
            state.config.clone()
        };

        match fs::metadata(&config.path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %config.path.display(), "watch path does not exist yet, will keep polling");
            }
            Err(e) => {
                warn!(path = %config.path.display(), error = %e, "watch path is not accessible");
            }
        }

        info!(
            path = %config.path.display(),
            poll_interval = ?config.poll_interval,
            "watcher started"
        );
        self.shared.emit(WatcherEvent::WatcherStarted {
            path: config.path.clone(),
        });

        if config.parse_existing_on_start {
            let shared = Arc::clone(&self.shared);
            match tokio::task::spawn_blocking(move || shared.scan(true)).await {
                Ok(Ok(count)) => debug!(count, "initial scan complete"),
                Ok(Err(e)) => warn!(error = %e, "initial scan failed"),
                Err(e) => warn!(error = %e, "initial scan task failed"),
            }
        }

        let mut task = self.task.lock();
        if !self.shared.state.read().running {
            // stopped while the initial scan ran
            return Ok(());
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.shared),
            config.poll_interval,
            stop_rx,
        ));
        *task = Some(PollTask { stop_tx, handle });
        Ok(())
    }

    /// Stop the poll loop. No-op if not running.
    ///
    /// Waits up to [`STOP_TIMEOUT`] for an in-flight scan to finish.
    pub async fn stop(&self) -> Result<(), WatcherError> {
        {
            let mut state = self.shared.state.write();
            if !state.running {
                return Ok(());
            }
            state.running = false;
        }

        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.stop_tx.send(true);
            match tokio::time::timeout(STOP_TIMEOUT, task.handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "poll loop ended abnormally"),
                Err(_) => warn!(
                    timeout_secs = STOP_TIMEOUT.as_secs(),
                    "poll loop did not stop in time"
                ),
            }
        }
        info!("watcher stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.read().running
    }

    pub fn config(&self) -> WatcherConfig {
        self.shared.state.read().config.clone()
    }

    /// Replace the configuration. Only allowed while stopped.
    pub fn update_config(&self, config: WatcherConfig) -> Result<(), WatcherError> {
        let mut state = self.shared.state.write();
        if state.running {
            return Err(WatcherError::Running);
        }
        state.config = config;
        Ok(())
    }

    /// Forget every seen file and every retained record.
    pub fn clear(&self) {
        let mut state = self.shared.state.write();
        state.seen.clear();
        state.recent.clear();
    }

    /// Use `provider` for motion enrichment. The watcher holds it weakly;
    /// once the caller drops it, enrichment behaves as if no provider was set.
    pub fn set_sample_provider(&self, provider: &Arc<dyn SampleProvider>) {
        self.shared.state.write().provider = Some(Arc::downgrade(provider));
    }

    pub fn clear_sample_provider(&self) {
        self.shared.state.write().provider = None;
    }

    /// Run one incremental scan on the calling thread and return how many
    /// records were announced. Blocks on file IO.
    pub fn scan_once(&self) -> Result<usize, WatcherError> {
        self.shared.scan(false)
    }

    /// Run the start-up scan on the calling thread: every file is parsed
    /// regardless of the seen-set, except that only the newest
    /// `parse_existing_limit` files are considered. Blocks on file IO.
    pub fn scan_existing(&self) -> Result<usize, WatcherError> {
        self.shared.scan(true)
    }

    /// Retained records, newest first. `limit == 0` returns all of them.
    pub fn recent(&self, limit: usize) -> Vec<SessionRecord> {
        let state = self.shared.state.read();
        let take = if limit == 0 {
            state.recent.len()
        } else {
            limit
        };
        state.recent.iter().rev().take(take).cloned().collect()
    }

    /// Re-read persisted traces for every retained record and announce the
    /// records whose trace changed. Returns the number announced.
    pub fn reload_traces(&self) -> usize {
        let names: Vec<String> = self
            .shared
            .state
            .read()
            .recent
            .iter()
            .map(|r| r.file_name.clone())
            .collect();

        let mut loaded = Vec::new();
        for name in names {
            if !self.shared.traces.exists(&name) {
                continue;
            }
            match self.shared.traces.load(&name) {
                Ok(doc) if !doc.mouse_trace.is_empty() => loaded.push((name, doc.mouse_trace)),
                Ok(_) => {}
                Err(e) => warn!(file = %name, error = %e, "failed to reload trace"),
            }
        }

        let mut updated = Vec::new();
        {
            let mut state = self.shared.state.write();
            for (name, trace) in loaded {
                if let Some(rec) = state.recent.iter_mut().find(|r| r.file_name == name) {
                    if rec.mouse_trace != trace {
                        rec.mouse_trace = trace;
                        updated.push(rec.clone());
                    }
                }
            }
        }

        let count = updated.len();
        for rec in updated {
            self.shared.emit(WatcherEvent::RecordUpdated(rec));
        }
        if count > 0 {
            info!(count, "reloaded motion traces");
        }
        count
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            let _ = task.stop_tx.send(true);
        }
    }
}

impl Shared {
    fn emit(&self, event: WatcherEvent) {
        // no subscribers is fine
        let _ = self.tx.send(event);
    }

    fn scan(&self, include_all: bool) -> Result<usize, WatcherError> {
        let _scanning = self.scan_lock.lock();
        let (dir, limit, provider) = {
            let state = self.state.read();
            (
                state.config.path.clone(),
                state.config.parse_existing_limit,
                state.provider.clone(),
            )
        };

        let mut candidates = list_candidates(&dir)?;

        if include_all && limit > 0 && candidates.len() > limit {
            let excess = candidates.len() - limit;
            let mut state = self.state.write();
            for older in candidates.drain(..excess) {
                state.seen.insert(older.path);
            }
            debug!(skipped = excess, limit, "skipping older existing files");
        }

        let provider = provider.and_then(|p| p.upgrade());
        let mut announced = 0;

        for candidate in candidates {
            if !include_all && self.state.read().seen.contains(&candidate.path) {
                continue;
            }

            let record = match ingest_file(&candidate.path, provider.as_deref(), &self.traces) {
                Ok(record) => record,
                Err(e) => {
                    error!(path = %candidate.path.display(), error = %e, "failed to parse session log");
                    continue;
                }
            };

            {
                let mut state = self.state.write();
                state.seen.insert(candidate.path.clone());
                state.recent.push_back(record.clone());
                let cap = state.config.recent_cap();
                while state.recent.len() > cap {
                    state.recent.pop_front();
                }
            }

            debug!(
                file = %record.file_name,
                played_at = %candidate.played_at.to_rfc3339(),
                events = record.events.len(),
                trace_samples = record.mouse_trace.len(),
                "session record added"
            );
            self.emit(WatcherEvent::RecordAdded(record));
            announced += 1;
        }

        Ok(announced)
    }
}

/// Session logs in `dir` with a parseable name, oldest first.
fn list_candidates(dir: &Path) -> Result<Vec<Candidate>, WatcherError> {
    let entries = fs::read_dir(dir).map_err(|source| WatcherError::ListDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates = Vec::new();
    for entry in entries.flatten() {
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_session_log(name) {
            continue;
        }
        match parse_filename(name) {
            Ok(info) => candidates.push(Candidate {
                path: dir.join(name),
                played_at: info.played_at,
            }),
            Err(e) => debug!(file = name, error = %e, "ignoring unrecognised file name"),
        }
    }

    candidates.sort_by(|a, b| {
        a.played_at
            .cmp(&b.played_at)
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(candidates)
}

async fn poll_loop(shared: Arc<Shared>, period: Duration, mut stop_rx: watch::Receiver<bool>) {
    let period = if period.is_zero() {
        Duration::from_secs(crate::DEFAULT_POLL_INTERVAL_SECS)
    } else {
        period
    };
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = stop_rx.changed() => {
                debug!("poll loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let scan_shared = Arc::clone(&shared);
                match tokio::task::spawn_blocking(move || scan_shared.scan(false)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => debug!(error = %e, "scan skipped"),
                    Err(e) => warn!(error = %e, "scan task failed"),
                }
            }
        }
    }
}
