use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use refleks_sessions::metrics::{KEY_ACCURACY, KEY_DATE_PLAYED, KEY_REAL_AVG_TTK};
use refleks_sessions::{
    ingest_file, parse_filename, DirectoryWatcher, SessionRecord, StatValue, TraceRecord,
    TraceStore, WatcherConfig,
};

use crate::config::Settings;

/// `refleks parse <file>`
pub fn handle_parse(settings: &Settings, file: &Path, json: bool) -> Result<()> {
    let traces = TraceStore::with_dir(&settings.traces_dir);
    let record = ingest_file(file, None, &traces)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record_detail(&record);
    }
    Ok(())
}

/// `refleks list`
pub fn handle_list(settings: &Settings, limit: Option<usize>, json: bool) -> Result<()> {
    if settings.stats_dir.as_os_str().is_empty() {
        anyhow::bail!("No stats directory configured. Pass --path, set stats_dir or REFLEKS_STATS_DIR.");
    }

    let limit = limit.unwrap_or(settings.max_existing_on_start);
    let config = WatcherConfig::new(&settings.stats_dir).with_parse_existing(true, limit);
    let watcher = DirectoryWatcher::new(config, Arc::new(TraceStore::with_dir(&settings.traces_dir)));
    watcher
        .scan_existing()
        .with_context(|| format!("Failed to scan {}", settings.stats_dir.display()))?;
    let records = watcher.recent(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("{}", "No session logs found.".dimmed());
    } else {
        print_records_table(&records);
    }
    Ok(())
}

/// `refleks trace <file-name>`
pub fn handle_trace(settings: &Settings, file_name: &str, json: bool) -> Result<()> {
    let traces = TraceStore::with_dir(&settings.traces_dir);
    let doc = traces
        .load(file_name)
        .with_context(|| format!("No trace for {}", file_name))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        print_trace(&doc);
    }
    Ok(())
}

fn print_records_table(records: &[SessionRecord]) {
    println!(
        "{:<36} {:<17} {:>8} {:>9} {:>8}",
        "SCENARIO".dimmed(),
        "PLAYED".dimmed(),
        "ACC".dimmed(),
        "TTK".dimmed(),
        "SAMPLES".dimmed(),
    );

    for r in records {
        let (scenario, played) = match parse_filename(&r.file_name) {
            Ok(info) => (
                info.scenario_name,
                info.played_at.format("%Y-%m-%d %H:%M").to_string(),
            ),
            Err(_) => (r.file_name.clone(), "-".to_string()),
        };
        let scenario = if scenario.chars().count() > 35 {
            format!("{}...", scenario.chars().take(32).collect::<String>())
        } else {
            scenario
        };
        let acc = r.stat(KEY_ACCURACY).map_or(0.0, StatValue::as_f64);
        let ttk = r
            .stat(KEY_REAL_AVG_TTK)
            .map(|v| format!("{:.3}s", v.as_f64()))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<36} {:<17} {:>8} {:>9} {:>8}",
            scenario,
            played,
            colored_accuracy(acc),
            ttk,
            r.mouse_trace.len()
        );
    }
}

fn colored_accuracy(acc: f64) -> String {
    let text = format!("{:.1}%", acc * 100.0);
    if acc >= 0.9 {
        text.bright_green().to_string()
    } else if acc >= 0.7 {
        text.bright_yellow().to_string()
    } else {
        text.bright_red().to_string()
    }
}

fn print_record_detail(record: &SessionRecord) {
    println!("{}", "=== Session ===".bright_blue().bold());
    println!("{}  {}", "File:".dimmed(), record.file_path.display());
    if let Ok(info) = parse_filename(&record.file_name) {
        println!("{}  {}", "Scenario:".dimmed(), info.scenario_name);
    }
    if let Some(played) = record.stat(KEY_DATE_PLAYED) {
        println!("{}  {}", "Played:".dimmed(), played);
    }
    let acc = record.stat(KEY_ACCURACY).map_or(0.0, StatValue::as_f64);
    println!("{}  {}", "Accuracy:".dimmed(), colored_accuracy(acc));
    if let Some(ttk) = record.stat(KEY_REAL_AVG_TTK) {
        println!("{}  {:.3}s", "Real Avg TTK:".dimmed(), ttk.as_f64());
    }
    println!("{}  {}", "Events:".dimmed(), record.events.len());
    println!("{}  {}", "Trace Samples:".dimmed(), record.mouse_trace.len());

    let derived = [KEY_ACCURACY, KEY_REAL_AVG_TTK, KEY_DATE_PLAYED];
    let rest: Vec<_> = record
        .summary
        .iter()
        .filter(|(k, _)| !derived.contains(&k.as_str()))
        .collect();
    if !rest.is_empty() {
        println!();
        println!("{}", format!("--- Summary ({}) ---", rest.len()).dimmed());
        for (key, value) in rest {
            println!("  {:<24} {}", key, value);
        }
    }
}

fn print_trace(doc: &TraceRecord) {
    println!("{}", "=== Trace ===".bright_blue().bold());
    println!("{}  {}", "File:".dimmed(), doc.file_name);
    println!("{}  {}", "Version:".dimmed(), doc.version);
    if !doc.scenario_name.is_empty() {
        println!("{}  {}", "Scenario:".dimmed(), doc.scenario_name);
    }
    if !doc.date_played.is_empty() {
        println!("{}  {}", "Played:".dimmed(), doc.date_played);
    }
    println!("{}  {}", "Samples:".dimmed(), doc.mouse_trace.len());

    let (Some(first), Some(last)) = (doc.mouse_trace.first(), doc.mouse_trace.last()) else {
        return;
    };
    let span = last.ts - first.ts;
    println!(
        "{}  {:.3}s",
        "Span:".dimmed(),
        span.num_milliseconds() as f64 / 1000.0
    );
    let min_x = doc.mouse_trace.iter().map(|s| s.x).min().unwrap_or(0);
    let max_x = doc.mouse_trace.iter().map(|s| s.x).max().unwrap_or(0);
    let min_y = doc.mouse_trace.iter().map(|s| s.y).min().unwrap_or(0);
    let max_y = doc.mouse_trace.iter().map(|s| s.y).max().unwrap_or(0);
    println!(
        "{}  x {}..{}, y {}..{}",
        "Extent:".dimmed(),
        min_x,
        max_x,
        min_y,
        max_y
    );
}
