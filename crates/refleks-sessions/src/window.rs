use chrono::{DateTime, Days, Duration, Local};

use crate::parser::parse_time_of_day_on;
use crate::types::{EventRow, SessionWindow, Summary};

pub const KEY_CHALLENGE_START: &str = "Challenge Start";

/// Assumed scenario length when neither a start key nor an event time exists.
pub const FALLBACK_SESSION_SECS: i64 = 60;

/// Compute the advisory [start, end] span of a session.
///
/// `end` is the played-at time from the file name. `start` comes from the
/// "Challenge Start" summary key, else the first event's time of day, else
/// `end - 60s`. A start later than end is a midnight rollover and moves back
/// one day.
pub fn derive_window(end: DateTime<Local>, summary: &Summary, events: &[EventRow]) -> SessionWindow {
    let start = summary
        .get(KEY_CHALLENGE_START)
        .and_then(|v| v.as_str())
        .and_then(|s| parse_time_of_day_on(s, &end))
        .or_else(|| {
            events
                .first()
                .and_then(|row| row.get(1))
                .and_then(|tod| parse_time_of_day_on(tod, &end))
        })
        .unwrap_or_else(|| end - Duration::seconds(FALLBACK_SESSION_SECS));

    let start = if start > end {
        start
            .checked_sub_days(Days::new(1))
            .unwrap_or_else(|| start - Duration::days(1))
    } else {
        start
    };

    SessionWindow { start, end }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StatValue;
    use chrono::{TimeZone, Timelike};

    fn end() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 10, 16, 57, 0).earliest().unwrap()
    }

    #[test]
    fn test_challenge_start_wins() {
        let mut summary = Summary::new();
        summary.insert(
            KEY_CHALLENGE_START.into(),
            StatValue::Text("16:56:00.000".into()),
        );
        let events = vec![vec!["0".to_string(), "16:56:30.000".to_string()]];

        let w = derive_window(end(), &summary, &events);
        assert_eq!((w.start.hour(), w.start.minute(), w.start.second()), (16, 56, 0));
        assert_eq!(w.end, end());
    }

    #[test]
    fn test_first_event_fallback() {
        let events = vec![vec!["0".to_string(), "16:56:30.250".to_string()]];
        let w = derive_window(end(), &Summary::new(), &events);
        assert_eq!(w.duration(), Duration::milliseconds(29_750));
    }

    #[test]
    fn test_fixed_fallback() {
        let w = derive_window(end(), &Summary::new(), &[]);
        assert_eq!(w.duration(), Duration::seconds(60));
    }

    #[test]
    fn test_non_text_challenge_start_is_ignored() {
        let mut summary = Summary::new();
        summary.insert(KEY_CHALLENGE_START.into(), StatValue::Int(5));
        let w = derive_window(end(), &summary, &[]);
        assert_eq!(w.duration(), Duration::seconds(60));
    }

    #[test]
    fn test_midnight_rollover_moves_start_back_a_day() {
        let end = Local.with_ymd_and_hms(2025, 3, 11, 0, 0, 30).earliest().unwrap();
        let mut summary = Summary::new();
        summary.insert(
            KEY_CHALLENGE_START.into(),
            StatValue::Text("23:59:30".into()),
        );
        let w = derive_window(end, &summary, &[]);
        assert!(w.start < w.end);
        assert_eq!(w.duration(), Duration::seconds(60));
    }
}
