use std::path::Path;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::metrics::augment_summary;
use crate::motion::SampleProvider;
use crate::parser::{parse_filename, parse_log_file};
use crate::traces::{TraceRecord, TraceStore, TRACE_VERSION};
use crate::types::{MotionSample, SessionRecord};
use crate::window::derive_window;

/// Whether a file name looks like an exported session log (`... Stats.csv`, any case).
pub fn is_session_log(name: &str) -> bool {
    name.to_lowercase().ends_with(" stats.csv")
}

/// Build an enriched record for one session log.
///
/// A live capture from `provider` wins. It is persisted the first time it is
/// seen for a file name and never overwrites an existing trace document.
/// Without a live capture, a previously persisted trace is used instead.
/// Trace storage failures are logged and leave the record without a trace.
pub fn ingest_file(
    path: &Path,
    provider: Option<&dyn SampleProvider>,
    traces: &TraceStore,
) -> Result<SessionRecord, ParseError> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let info = parse_filename(&file_name)?;
    let parsed = parse_log_file(path)?;

    let mut summary = parsed.summary;
    let events = parsed.events;
    augment_summary(&mut summary, &events, &info.played_at);

    let mut mouse_trace: Vec<MotionSample> = Vec::new();
    if let Some(provider) = provider.filter(|p| p.enabled()) {
        let window = derive_window(info.played_at, &summary, &events);
        if window.start < window.end {
            mouse_trace = provider.get_range(
                window.start.with_timezone(&Utc),
                window.end.with_timezone(&Utc),
            );
            debug!(
                file = %file_name,
                samples = mouse_trace.len(),
                start = %window.start.to_rfc3339(),
                end = %window.end.to_rfc3339(),
                "captured motion trace"
            );
        }
    }

    if !mouse_trace.is_empty() {
        if !traces.exists(&file_name) {
            let doc = TraceRecord {
                version: TRACE_VERSION,
                file_name: file_name.clone(),
                scenario_name: info.scenario_name.clone(),
                date_played: info.played_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                mouse_trace: mouse_trace.clone(),
            };
            if let Err(e) = traces.save(&doc) {
                warn!(file = %file_name, error = %e, "failed to persist motion trace");
            }
        }
    } else if traces.exists(&file_name) {
        match traces.load(&file_name) {
            Ok(doc) if !doc.mouse_trace.is_empty() => mouse_trace = doc.mouse_trace,
            Ok(_) => {}
            Err(e) => warn!(file = %file_name, error = %e, "failed to load persisted trace"),
        }
    }

    Ok(SessionRecord {
        file_path: path.to_path_buf(),
        file_name,
        events,
        summary,
        mouse_trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_session_log() {
        assert!(is_session_log("A - B - 2025.01.02-03.04.05 Stats.csv"));
        assert!(is_session_log("a - b - 2025.01.02-03.04.05 STATS.CSV"));
        assert!(!is_session_log("A - B - 2025.01.02-03.04.05.csv"));
        assert!(!is_session_log("Stats.csv"));
    }
}
