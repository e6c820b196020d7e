use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone};
use lazy_static::lazy_static;
use regex::Regex;

use crate::encoding;
use crate::error::{FilenameError, ParseError};
use crate::types::{EventRow, FilenameInfo, StatValue, Summary};

lazy_static! {
    // Example: "Air Tracking 180 - Challenge - 2025.09.09-16.57.00 Stats.csv"
    static ref FILENAME_RE: Regex = Regex::new(
        r"^(?P<name>.+?)[\t\n\f\r ]-[\t\n\f\r ].*?-[\t\n\f\r ](?P<dt>[0-9]{4}\.[0-9]{2}\.[0-9]{2}-[0-9]{2}\.[0-9]{2}\.[0-9]{2})[\t\n\f\r ]Stats\.csv$"
    )
    .expect("filename pattern is valid");
}

const FILENAME_DATETIME_FORMAT: &str = "%Y.%m.%d-%H.%M.%S";

/// Marks the start of the key/value section, and splits key from value.
pub const KV_SEPARATOR: &str = ":,";

/// Time-of-day layouts, tried in order: microseconds, milliseconds, bare seconds.
/// The last entry accepts any other fraction width.
const TIME_OF_DAY_FORMATS: [&str; 4] = ["%H:%M:%S%.6f", "%H:%M:%S%.3f", "%H:%M:%S", "%H:%M:%S%.f"];

/// Events and summary of one session log.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedLog {
    pub events: Vec<EventRow>,
    pub summary: Summary,
}

/// Extract scenario name and played-at time (local) from a session log file name.
pub fn parse_filename(filename: &str) -> Result<FilenameInfo, FilenameError> {
    let base = Path::new(filename)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);

    let caps = FILENAME_RE
        .captures(base)
        .ok_or_else(|| FilenameError::NotMatched(base.to_string()))?;

    let naive = NaiveDateTime::parse_from_str(&caps["dt"], FILENAME_DATETIME_FORMAT)
        .map_err(|_| FilenameError::InvalidTimestamp(base.to_string()))?;
    let played_at = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| FilenameError::InvalidTimestamp(base.to_string()))?;

    Ok(FilenameInfo {
        scenario_name: caps["name"].to_string(),
        played_at,
    })
}

/// Read and split a session log into event rows and the summary map.
pub fn parse_log_file(path: &Path) -> Result<ParsedLog, ParseError> {
    let text = encoding::read_text(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_log_text(&text)
}

/// Split decoded log text into event rows and the summary map.
///
/// Every line before the first one containing `:,` is an event-row candidate;
/// that line and everything after it are key/value lines. Candidates that do
/// not look like per-kill rows (headers, weapon tables) are dropped.
pub fn parse_log_text(text: &str) -> Result<ParsedLog, ParseError> {
    let mut events = Vec::new();
    let mut kv_lines = Vec::new();
    let mut in_kv = false;

    for (idx, raw) in text.split('\n').enumerate() {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }

        if !in_kv && line.contains(KV_SEPARATOR) {
            in_kv = true;
        }

        if in_kv {
            kv_lines.push(line);
            continue;
        }

        let row = split_csv_line(line).map_err(|reason| ParseError::MalformedRow {
            line: idx + 1,
            reason,
        })?;
        if is_event_row(&row) {
            events.push(row);
        }
    }

    let mut summary = Summary::new();
    for line in kv_lines {
        let Some((key, val)) = line.split_once(KV_SEPARATOR) else {
            continue;
        };
        summary.insert(key.trim().to_string(), StatValue::coerce(val));
    }

    Ok(ParsedLog { events, summary })
}

/// Parse a clock time (`HH:MM:SS[.fraction]`) onto the calendar date of `date`.
pub fn parse_time_of_day_on(s: &str, date: &DateTime<Local>) -> Option<DateTime<Local>> {
    let s = s.trim();
    let time = TIME_OF_DAY_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())?;
    Local
        .from_local_datetime(&date.date_naive().and_time(time))
        .earliest()
}

/// A row is a per-kill event when field 0 is an integer index and field 1
/// starts with an `HH:MM:SS` clock time.
fn is_event_row(row: &[String]) -> bool {
    if row.len() < 2 {
        return false;
    }
    if row[0].trim().parse::<i64>().is_err() {
        return false;
    }
    let s = row[1].trim().as_bytes();
    if s.len() < 8 || s[2] != b':' || s[5] != b':' {
        return false;
    }
    [s[0], s[1], s[3], s[4], s[6], s[7]]
        .iter()
        .all(u8::is_ascii_digit)
}

/// Split one line into comma-separated fields.
///
/// Leading whitespace of every field is dropped. A field that starts with a
/// quote runs to the matching closing quote, with `""` as an escaped quote; a
/// quote anywhere else is an error.
fn split_csv_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut rest = line;

    loop {
        rest = rest.trim_start();
        if let Some(quoted) = rest.strip_prefix('"') {
            let mut field = String::new();
            let mut chars = quoted.char_indices();
            let after = loop {
                match chars.next() {
                    Some((i, '"')) => {
                        if quoted[i + 1..].starts_with('"') {
                            field.push('"');
                            chars.next();
                        } else {
                            break &quoted[i + 1..];
                        }
                    }
                    Some((_, c)) => field.push(c),
                    None => return Err("unterminated quoted field".to_string()),
                }
            };
            fields.push(field);
            if after.is_empty() {
                return Ok(fields);
            }
            match after.strip_prefix(',') {
                Some(next) => rest = next,
                None => return Err("extraneous text after quoted field".to_string()),
            }
        } else {
            let (field, next) = match rest.split_once(',') {
                Some((field, next)) => (field, Some(next)),
                None => (rest, None),
            };
            if field.contains('"') {
                return Err("bare quote in unquoted field".to_string());
            }
            fields.push(field.to_string());
            match next {
                Some(next) => rest = next,
                None => return Ok(fields),
            }
        }
    }
}
