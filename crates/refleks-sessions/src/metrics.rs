use chrono::{DateTime, Local, SecondsFormat};

use crate::parser::parse_time_of_day_on;
use crate::types::{EventRow, StatValue, Summary};

pub const KEY_DATE_PLAYED: &str = "Date Played";
pub const KEY_ACCURACY: &str = "Accuracy";
pub const KEY_REAL_AVG_TTK: &str = "Real Avg TTK";
pub const KEY_HIT_COUNT: &str = "Hit Count";
pub const KEY_MISS_COUNT: &str = "Miss Count";

/// Add derived fields to a parsed summary: normalized played-at timestamp,
/// accuracy, and (when recoverable) the real average time-to-kill.
pub fn augment_summary(summary: &mut Summary, events: &[EventRow], played_at: &DateTime<Local>) {
    summary.insert(
        KEY_DATE_PLAYED.to_string(),
        StatValue::Text(played_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );

    let acc = accuracy(summary);
    summary.insert(KEY_ACCURACY.to_string(), StatValue::Float(acc));

    if let Some(ttk) = real_avg_ttk(events, played_at) {
        summary.insert(KEY_REAL_AVG_TTK.to_string(), StatValue::Float(ttk));
    }
}

/// hits / (hits + misses), or 0 when there were no shots at all.
pub fn accuracy(summary: &Summary) -> f64 {
    let hit = summary.get(KEY_HIT_COUNT).map_or(0.0, StatValue::as_f64);
    let miss = summary.get(KEY_MISS_COUNT).map_or(0.0, StatValue::as_f64);
    let denom = hit + miss;
    if denom > 0.0 {
        hit / denom
    } else {
        0.0
    }
}

/// Average seconds between consecutive kill events.
///
/// Only the event timestamps are trusted: the reported fight-time field has
/// changed units between trainer versions. Negative intervals (clock going
/// backwards) add nothing but still count as an interval.
pub fn real_avg_ttk(events: &[EventRow], played_at: &DateTime<Local>) -> Option<f64> {
    if events.len() < 2 {
        return None;
    }

    let times: Vec<DateTime<Local>> = events
        .iter()
        .filter(|row| row.len() >= 2)
        .filter_map(|row| parse_time_of_day_on(&row[1], played_at))
        .collect();
    if times.len() < 2 {
        return None;
    }

    let total: f64 = times
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|dt| *dt > chrono::Duration::zero())
        .map(|dt| dt.to_std().map_or(0.0, |d| d.as_secs_f64()))
        .sum();

    Some(total / (times.len() - 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).earliest().unwrap()
    }

    fn row(idx: &str, tod: &str) -> EventRow {
        vec![idx.to_string(), tod.to_string(), "Bot".to_string()]
    }

    #[test]
    fn test_accuracy_with_missing_fields_is_zero() {
        assert_eq!(accuracy(&Summary::new()), 0.0);
    }

    #[test]
    fn test_accuracy_from_text_counts() {
        let mut summary = Summary::new();
        summary.insert(KEY_HIT_COUNT.into(), StatValue::Text("3".into()));
        summary.insert(KEY_MISS_COUNT.into(), StatValue::Int(1));
        assert_eq!(accuracy(&summary), 0.75);
    }

    #[test]
    fn test_ttk_skips_negative_intervals_but_counts_them() {
        let events = vec![
            row("0", "03:04:05.000"),
            row("1", "03:04:07.000"),
            row("2", "03:04:06.000"),
        ];
        assert_eq!(real_avg_ttk(&events, &date()), Some(1.0));
    }

    #[test]
    fn test_ttk_keeps_sub_microsecond_fractions() {
        let events = vec![
            row("0", "03:04:05.000000000"),
            row("1", "03:04:05.000000500"),
        ];
        let ttk = real_avg_ttk(&events, &date()).unwrap();
        assert!((ttk - 5e-7).abs() < 1e-12, "ttk = {ttk}");
    }

    #[test]
    fn test_ttk_needs_two_recoverable_times() {
        let events = vec![row("0", "03:04:05.000"), vec!["1".to_string()]];
        assert_eq!(real_avg_ttk(&events, &date()), None);
        assert_eq!(real_avg_ttk(&[], &date()), None);
    }

    #[test]
    fn test_augment_adds_all_fields() {
        let mut summary = Summary::new();
        summary.insert(KEY_HIT_COUNT.into(), StatValue::Int(8));
        summary.insert(KEY_MISS_COUNT.into(), StatValue::Int(2));
        let events = vec![row("0", "03:04:05.000"), row("1", "03:04:06.500")];

        augment_summary(&mut summary, &events, &date());

        assert_eq!(summary.get(KEY_ACCURACY), Some(&StatValue::Float(0.8)));
        assert_eq!(summary.get(KEY_REAL_AVG_TTK), Some(&StatValue::Float(1.5)));
        let played = summary.get(KEY_DATE_PLAYED).and_then(StatValue::as_str).unwrap();
        assert!(played.starts_with("2025-01-02T03:04:05"));
    }
}
