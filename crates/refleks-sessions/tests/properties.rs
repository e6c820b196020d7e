//! Property tests for parsing, naming and the motion buffer.

use std::time::Duration;

use chrono::{Datelike, TimeZone, Timelike, Utc};
use proptest::prelude::*;
use refleks_sessions::encoding::decode;
use refleks_sessions::metrics::accuracy;
use refleks_sessions::{
    parse_filename, parse_log_text, trace_file_name, MotionBuffer, SampleProvider, StatValue,
    Summary,
};

fn arb_scenario() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 ]{0,20}[A-Za-z0-9]"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any well-formed name yields its scenario and wall-clock time back.
    #[test]
    fn filename_fields_are_recovered(
        scenario in arb_scenario(),
        year in 2000i32..2100,
        month in 1u32..=12,
        day in 1u32..=28,
        hour in 12u32..20,
        minute in 0u32..60,
        second in 0u32..60,
    ) {
        let name = format!(
            "{scenario} - Challenge - {year:04}.{month:02}.{day:02}-{hour:02}.{minute:02}.{second:02} Stats.csv"
        );
        let info = parse_filename(&name).unwrap();
        prop_assert_eq!(info.scenario_name, scenario);
        let t = info.played_at;
        prop_assert_eq!((t.year(), t.month(), t.day()), (year, month, day));
        prop_assert_eq!((t.hour(), t.minute(), t.second()), (hour, minute, second));
    }

    /// Names without the trailing ` Stats.csv` are never accepted.
    #[test]
    fn names_without_stats_suffix_are_rejected(
        scenario in arb_scenario(),
        suffix in prop_oneof![Just(".csv"), Just(" stats.csv"), Just(" Stats.txt"), Just("")],
    ) {
        let name = format!("{scenario} - Challenge - 2025.01.02-12.00.00{suffix}");
        prop_assert!(parse_filename(&name).is_err());
    }

    /// Parsing the same text twice gives the same result.
    #[test]
    fn log_text_parse_is_deterministic(
        kills in prop::collection::vec((0u32..24, 0u32..60, 0u32..60, 0u32..1000), 0..20),
        hits in 0u32..500,
        misses in 0u32..500,
    ) {
        let mut text = String::from("Kill #,Timestamp,Bot\n");
        for (i, (h, m, s, ms)) in kills.iter().enumerate() {
            text.push_str(&format!("{i},{h:02}:{m:02}:{s:02}.{ms:03},Bot\n"));
        }
        text.push_str(&format!("Hit Count:,{hits}\nMiss Count:,{misses}\n"));

        let first = parse_log_text(&text).unwrap();
        let second = parse_log_text(&text).unwrap();
        prop_assert_eq!(first.events.len(), kills.len());
        prop_assert_eq!(first, second);
    }

    /// Arbitrary text never panics and only keeps rows shaped like events.
    #[test]
    fn log_text_parse_is_total(text in "(?s).{0,400}") {
        if let Ok(parsed) = parse_log_text(&text) {
            for row in &parsed.events {
                prop_assert!(row.len() >= 2);
                prop_assert!(row[0].trim().parse::<i64>().is_ok());
            }
        }
    }

    #[test]
    fn trace_names_are_flat_json_files(name in "[^\u{0}]{1,60}") {
        let out = trace_file_name(&name);
        prop_assert!(!out.contains('/'));
        prop_assert!(out.ends_with(".json"));
    }

    #[test]
    fn accuracy_is_a_ratio(hits in 0i64..100_000, misses in 0i64..100_000) {
        let mut summary = Summary::new();
        summary.insert("Hit Count".into(), StatValue::Int(hits));
        summary.insert("Miss Count".into(), StatValue::Int(misses));
        let acc = accuracy(&summary);
        prop_assert!((0.0..=1.0).contains(&acc));
    }

    #[test]
    fn utf16_with_bom_decodes_losslessly(text in "\\PC{0,200}") {
        let mut le = vec![0xFF, 0xFE];
        let mut be = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
            be.extend_from_slice(&unit.to_be_bytes());
        }
        prop_assert_eq!(decode(&le), text.clone());
        prop_assert_eq!(decode(&be), text);
    }

    /// Range queries return exactly the recorded samples inside the bounds, in order.
    #[test]
    fn buffer_range_matches_filter(
        moves in prop::collection::vec((1u32..5_000, -50i32..50, -50i32..50), 1..80),
        from_ms in 0i64..200_000,
        span_ms in 0i64..200_000,
    ) {
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let buffer = MotionBuffer::new(Duration::from_secs(24 * 3600));
        buffer.start();

        let mut ts = base;
        for (gap, dx, dy) in &moves {
            ts += chrono::Duration::milliseconds(i64::from(*gap));
            buffer.record_delta_at(ts, *dx, *dy);
        }

        let start = base + chrono::Duration::milliseconds(from_ms);
        let end = start + chrono::Duration::milliseconds(span_ms);
        let all = buffer.get_range(base, ts);
        let expected: Vec<_> = all
            .iter()
            .copied()
            .filter(|s| s.ts >= start && s.ts <= end)
            .collect();

        let got = buffer.get_range(start, end);
        prop_assert!(got.windows(2).all(|w| w[0].ts <= w[1].ts));
        prop_assert_eq!(got, expected);
    }
}
