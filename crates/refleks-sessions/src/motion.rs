use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::types::MotionSample;

/// Supplies time-ranged motion traces for enrichment.
///
/// Implementations must tolerate `get_range` while samples are being appended.
pub trait SampleProvider: Send + Sync {
    /// Whether capture is active.
    fn enabled(&self) -> bool;

    /// Samples with `start <= ts <= end`, in timestamp order. Empty when disabled.
    fn get_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<MotionSample>;
}

struct BufferState {
    running: bool,
    retention: Duration,
    samples: VecDeque<MotionSample>,
    vx: i32,
    vy: i32,
}

/// Time-pruned ring buffer of motion samples fed by an input driver.
///
/// The driver reports relative deltas; the buffer accumulates them into an
/// unbounded virtual position that is never clamped to a screen.
pub struct MotionBuffer {
    state: RwLock<BufferState>,
}

impl MotionBuffer {
    pub fn new(retention: Duration) -> Self {
        Self {
            state: RwLock::new(BufferState {
                running: false,
                retention,
                samples: VecDeque::new(),
                vx: 0,
                vy: 0,
            }),
        }
    }

    /// Begin accepting samples. No-op if already running.
    pub fn start(&self) {
        self.state.write().running = true;
    }

    /// Stop accepting samples and drop the buffer. No-op if not running.
    pub fn stop(&self) {
        let mut state = self.state.write();
        if !state.running {
            return;
        }
        state.running = false;
        state.samples.clear();
    }

    /// Change the retention window and prune immediately.
    pub fn set_buffer_duration(&self, retention: Duration) {
        let mut state = self.state.write();
        state.retention = retention;
        prune(&mut state, Utc::now());
    }

    pub fn buffer_duration(&self) -> Duration {
        self.state.read().retention
    }

    /// Record a relative movement observed now.
    pub fn record_delta(&self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        let mut state = self.state.write();
        push_delta(&mut state, Utc::now(), dx, dy);
    }

    /// Record a relative movement observed at `ts`. A timestamp older than the
    /// last sample is clamped to it so the buffer stays in timestamp order.
    pub fn record_delta_at(&self, ts: DateTime<Utc>, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        let mut state = self.state.write();
        push_delta(&mut state, ts, dx, dy);
    }

    pub fn len(&self) -> usize {
        self.state.read().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SampleProvider for MotionBuffer {
    fn enabled(&self) -> bool {
        self.state.read().running
    }

    fn get_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<MotionSample> {
        let state = self.state.read();
        if !state.running || start > end {
            return Vec::new();
        }
        let lo = state.samples.partition_point(|s| s.ts < start);
        let hi = state.samples.partition_point(|s| s.ts <= end);
        state.samples.range(lo..hi).copied().collect()
    }
}

fn push_delta(state: &mut BufferState, ts: DateTime<Utc>, dx: i32, dy: i32) {
    if !state.running {
        return;
    }
    let ts = match state.samples.back() {
        Some(last) if last.ts > ts => last.ts,
        _ => ts,
    };
    state.vx = state.vx.wrapping_add(dx);
    state.vy = state.vy.wrapping_add(dy);
    let sample = MotionSample {
        ts,
        x: state.vx,
        y: state.vy,
    };
    state.samples.push_back(sample);
    prune(state, ts);
}

fn prune(state: &mut BufferState, now: DateTime<Utc>) {
    let Ok(retention) = chrono::Duration::from_std(state.retention) else {
        return;
    };
    let cutoff = now - retention;
    while state.samples.front().is_some_and(|s| s.ts < cutoff) {
        state.samples.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_deltas_accumulate_and_range_is_inclusive() {
        let buf = MotionBuffer::new(Duration::from_secs(600));
        buf.start();
        buf.record_delta_at(at(0), 5, -3);
        buf.record_delta_at(at(1), 5, -3);
        buf.record_delta_at(at(2), -20, 1);
        buf.record_delta_at(at(3), 0, 0);

        let all = buf.get_range(at(0), at(2));
        assert_eq!(all.len(), 3);
        assert_eq!((all[1].x, all[1].y), (10, -6));
        assert_eq!((all[2].x, all[2].y), (-10, -5));

        let mid = buf.get_range(at(1), at(1));
        assert_eq!(mid.len(), 1);
        assert!(buf.get_range(at(2), at(1)).is_empty());
    }

    #[test]
    fn test_retention_prunes_old_samples() {
        let buf = MotionBuffer::new(Duration::from_secs(10));
        buf.start();
        buf.record_delta_at(at(0), 1, 1);
        buf.record_delta_at(at(5), 1, 1);
        buf.record_delta_at(at(12), 1, 1);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.get_range(at(0), at(20))[0].ts, at(5));
    }

    #[test]
    fn test_late_timestamps_keep_buffer_ordered() {
        let buf = MotionBuffer::new(Duration::from_secs(600));
        buf.start();
        buf.record_delta_at(at(10), 1, 0);
        buf.record_delta_at(at(5), 1, 0);
        buf.record_delta_at(at(12), 1, 0);

        let all = buf.get_range(at(0), at(20));
        let ts: Vec<_> = all.iter().map(|s| s.ts).collect();
        assert_eq!(ts, vec![at(10), at(10), at(12)]);
        assert_eq!(all[1].x, 2);
        assert!(buf.get_range(at(4), at(6)).is_empty());
    }

    #[test]
    fn test_concurrent_live_deltas_stay_ordered() {
        let buf = MotionBuffer::new(Duration::from_secs(600));
        buf.start();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..250 {
                        buf.record_delta(1, 1);
                    }
                });
            }
        });

        let all = buf.get_range(
            Utc::now() - chrono::Duration::minutes(1),
            Utc::now() + chrono::Duration::minutes(1),
        );
        assert_eq!(all.len(), 1000);
        assert!(all.windows(2).all(|w| w[0].ts <= w[1].ts));
        assert_eq!(all[999].x, 1000);
    }

    #[test]
    fn test_stopped_buffer_ignores_input_and_returns_nothing() {
        let buf = MotionBuffer::new(Duration::from_secs(600));
        buf.record_delta_at(at(0), 1, 1);
        assert!(buf.is_empty());
        assert!(!buf.enabled());

        buf.start();
        buf.record_delta_at(at(1), 1, 1);
        buf.stop();
        assert!(buf.is_empty());
        assert!(buf.get_range(at(0), at(5)).is_empty());
    }
}
