use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Per-group sliding window of user-message timestamps. Bot-originated
/// messages are never recorded, so the bot cannot inflate its own read of
/// how lively a group is.
pub struct GroupActivityTracker {
    window: Duration,
    /// Window messages that count as "very active": window minutes × the
    /// per-minute normalizer.
    saturation: f32,
    groups: DashMap<String, VecDeque<DateTime<Utc>>>,
}

impl GroupActivityTracker {
    pub fn new(window_ms: i64, per_minute_normalizer: u32) -> Self {
        let minutes = window_ms as f32 / 60_000.0;
        Self {
            window: Duration::milliseconds(window_ms),
            saturation: minutes * per_minute_normalizer as f32,
            groups: DashMap::new(),
        }
    }

    pub fn record(&self, group_key: &str, at: DateTime<Utc>) {
        let mut window = self.groups.entry(group_key.to_owned()).or_default();
        window.push_back(at);
    }

    /// Evict expired entries and return (count, activity level in [0,1]).
    pub fn read(&self, group_key: &str, now: DateTime<Utc>) -> (usize, f32) {
        let Some(mut window) = self.groups.get_mut(group_key) else {
            return (0, 0.0);
        };
        let cutoff = now - self.window;
        while window.front().is_some_and(|&t| t < cutoff) {
            window.pop_front();
        }
        let count = window.len();
        (count, (count as f32 / self.saturation).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> GroupActivityTracker {
        GroupActivityTracker::new(300_000, 10)
    }

    #[test]
    fn empty_group_reads_zero() {
        let t = tracker();
        assert_eq!(t.read("qq:g1", Utc::now()), (0, 0.0));
    }

    #[test]
    fn level_scales_with_count() {
        let t = tracker();
        let now = Utc::now();
        for _ in 0..25 {
            t.record("qq:g1", now);
        }
        let (count, level) = t.read("qq:g1", now);
        assert_eq!(count, 25);
        // 25 / (5 min × 10/min) = 0.5
        assert!((level - 0.5).abs() < 0.001);
    }

    #[test]
    fn level_saturates_at_one() {
        let t = tracker();
        let now = Utc::now();
        for _ in 0..100 {
            t.record("qq:g1", now);
        }
        let (_, level) = t.read("qq:g1", now);
        assert_eq!(level, 1.0);
    }

    #[test]
    fn expired_entries_are_evicted_on_read() {
        let t = tracker();
        let now = Utc::now();
        t.record("qq:g1", now - Duration::seconds(400));
        t.record("qq:g1", now - Duration::seconds(10));
        let (count, _) = t.read("qq:g1", now);
        assert_eq!(count, 1);
    }

    #[test]
    fn groups_are_independent() {
        let t = tracker();
        let now = Utc::now();
        t.record("qq:g1", now);
        assert_eq!(t.read("qq:g2", now), (0, 0.0));
    }
}
