use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{info, warn};

use refleks_logging::{EventLog, LogEvent};
use refleks_sessions::WatcherEvent;

use crate::app::App;
use crate::config::Overrides;

/// `refleks watch`: announce sessions until interrupted.
pub async fn run(config: Option<PathBuf>, overrides: Overrides, log: EventLog) -> Result<()> {
    let settings = overrides.load(config.as_deref())?;
    if settings.stats_dir.as_os_str().is_empty() {
        anyhow::bail!(
            "No stats directory configured. Pass --path, set stats_dir in refleks.toml or set REFLEKS_STATS_DIR."
        );
    }

    let mut app = App::new(settings);
    let mut events = app.watcher().subscribe();

    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Stopping watcher...");
        let _ = shutdown_tx.send(());
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut hangup = Hangup::new()?;

    // drain while the initial scan runs so large backlogs do not lag the channel
    {
        let start = app.start();
        tokio::pin!(start);
        loop {
            tokio::select! {
                started = &mut start => {
                    started?;
                    break;
                }
                event = events.recv() => {
                    announce(&app, &log, event);
                }
            }
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                if !announce(&app, &log, event) {
                    break;
                }
            }
            _ = shutdown_rx.recv() => break,
            _ = hangup.recv() => {
                info!("reloading settings");
                let applied = match overrides.load(config.as_deref()) {
                    Ok(settings) => app.apply_settings(settings).await,
                    Err(e) => Err(e),
                };
                match applied {
                    Ok(reloaded) => info!(
                        stats_dir = %app.settings().stats_dir.display(),
                        reloaded,
                        "settings applied"
                    ),
                    Err(e) => log.log(&LogEvent::ErrorEncountered {
                        error: format!("Failed to reload settings: {:#}", e),
                    }),
                }
            }
        }
    }

    let buffered = app.motion().len();
    app.stop().await?;
    info!(buffered_samples = buffered, "watcher shut down");
    // flush anything announced before the loop ended
    while let Ok(event) = events.try_recv() {
        log.log(&app.log_event(&event));
    }
    log.log(&LogEvent::WatcherStopped);
    Ok(())
}

/// Render one received announcement. Returns false once the channel is closed.
fn announce(app: &App, log: &EventLog, event: Result<WatcherEvent, RecvError>) -> bool {
    match event {
        Ok(event) => log.log(&app.log_event(&event)),
        Err(RecvError::Lagged(skipped)) => warn!(skipped, "announcements dropped"),
        Err(RecvError::Closed) => return false,
    }
    true
}

/// SIGHUP listener; never fires where the signal does not exist.
#[cfg(unix)]
struct Hangup(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Hangup {
    fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        let sig = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
        Ok(Self(sig))
    }

    async fn recv(&mut self) -> Option<()> {
        self.0.recv().await
    }
}

#[cfg(not(unix))]
struct Hangup;

#[cfg(not(unix))]
impl Hangup {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Option<()> {
        std::future::pending().await
    }
}
