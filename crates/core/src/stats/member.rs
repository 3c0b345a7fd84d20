use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::lingo;
use crate::types::SpamType;

/// Bounded per-member recent message list.
const RECENT_CAP: usize = 30;
/// Window for the message-rate score.
const RATE_WINDOW_SECS: i64 = 300;
/// Messages over the rate window that count as "very active":
/// 5 minutes × 10 msg/min.
const RATE_NORMALIZER: f32 = 50.0;
/// Days of tenure that saturate the intimacy bonus.
const TENURE_SATURATION_DAYS: f32 = 14.0;

/// One remembered message from a member.
#[derive(Debug, Clone)]
pub(crate) struct RecentMessage {
    pub at: DateTime<Utc>,
    pub raw: String,
    pub normalized: String,
}

/// Per-sender counters plus a bounded recent-message buffer. Derived
/// scores are computed on read and clamped to [0,1].
#[derive(Debug, Clone)]
pub struct MemberStats {
    pub messages_from_user: u64,
    pub replies_from_bot: u64,
    pub mentions_bot: u64,
    pub first_seen_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub last_replied_at: Option<DateTime<Utc>>,
    recent: VecDeque<RecentMessage>,
}

/// Planner-facing view of one member at one instant.
#[derive(Debug, Clone, Default)]
pub struct MemberSignals {
    pub intimacy: f32,
    pub message_rate: f32,
    pub repetition: f32,
    pub spam: SpamType,
    pub urgency: f32,
    pub meme_score: f32,
}

impl MemberStats {
    pub fn new(first_seen_at: DateTime<Utc>) -> Self {
        Self {
            messages_from_user: 0,
            replies_from_bot: 0,
            mentions_bot: 0,
            first_seen_at,
            last_active_at: first_seen_at,
            last_replied_at: None,
            recent: VecDeque::with_capacity(RECENT_CAP),
        }
    }

    pub fn record_message(&mut self, at: DateTime<Utc>, text: &str, mentions_bot: bool) {
        self.messages_from_user += 1;
        if mentions_bot {
            self.mentions_bot += 1;
        }
        self.last_active_at = at;
        if self.recent.len() >= RECENT_CAP {
            self.recent.pop_front();
        }
        self.recent.push_back(RecentMessage {
            at,
            raw: text.to_owned(),
            normalized: lingo::normalize(text),
        });
    }

    pub fn record_bot_reply(&mut self, at: DateTime<Utc>) {
        self.replies_from_bot += 1;
        self.last_replied_at = Some(at);
    }

    /// Recent messages newer than `window_secs`, oldest first.
    pub(crate) fn recent_within(&self, now: DateTime<Utc>, window_secs: i64) -> Vec<&RecentMessage> {
        let cutoff = now - Duration::seconds(window_secs);
        self.recent.iter().filter(|m| m.at >= cutoff).collect()
    }

    fn reply_ratio(&self) -> f32 {
        (self.replies_from_bot as f32 / self.messages_from_user.max(1) as f32).clamp(0.0, 1.0)
    }

    /// Intimacy = 0.15 + 0.4·reply_ratio + 0.2·mention_ratio + 0.25·tenure.
    pub fn intimacy(&self, now: DateTime<Utc>) -> f32 {
        let mention_ratio =
            (self.mentions_bot as f32 / self.messages_from_user.max(1) as f32).clamp(0.0, 1.0);
        let tenure_days = (now - self.first_seen_at).num_days() as f32;
        let tenure = (tenure_days / TENURE_SATURATION_DAYS).clamp(0.0, 1.0);
        (0.15 + 0.4 * self.reply_ratio() + 0.2 * mention_ratio + 0.25 * tenure).clamp(0.0, 1.0)
    }

    /// Messages over the last 5 minutes against the "very active" normalizer.
    pub fn message_rate(&self, now: DateTime<Utc>) -> f32 {
        let n = self.recent_within(now, RATE_WINDOW_SECS).len();
        (n as f32 / RATE_NORMALIZER).clamp(0.0, 1.0)
    }

    /// Max occurrences of any normalized text in the last 2 minutes:
    /// `(max − 1) / 3`, clamped.
    pub fn repetition(&self, now: DateTime<Utc>) -> f32 {
        let recent = self.recent_within(now, 120);
        let mut max = 0usize;
        for (i, a) in recent.iter().enumerate() {
            if a.normalized.is_empty() {
                continue;
            }
            let count = recent[i..]
                .iter()
                .filter(|b| b.normalized == a.normalized)
                .count();
            max = max.max(count);
        }
        if max == 0 {
            return 0.0;
        }
        (((max - 1) as f32) / 3.0).clamp(0.0, 1.0)
    }

    /// Urgency for help-seeking senders:
    /// 0.6·min(n/5,1) + 0.2·intimacy + 0.2·reply_ratio.
    pub fn urgency(&self, now: DateTime<Utc>) -> f32 {
        let n = self.recent_within(now, 120).len() as f32;
        (0.6 * (n / 5.0).min(1.0) + 0.2 * self.intimacy(now) + 0.2 * self.reply_ratio())
            .clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs_ago: i64) -> DateTime<Utc> {
        Utc::now() - Duration::seconds(secs_ago)
    }

    #[test]
    fn new_member_baseline_intimacy() {
        let now = Utc::now();
        let mut m = MemberStats::new(now);
        m.record_message(now, "hi", false);
        // 0.15 base, nothing else yet.
        assert!((m.intimacy(now) - 0.15).abs() < 0.001);
    }

    #[test]
    fn intimacy_grows_with_replies_and_tenure() {
        let now = Utc::now();
        let mut m = MemberStats::new(now - Duration::days(14));
        for _ in 0..10 {
            m.record_message(now, "hello", true);
        }
        for _ in 0..5 {
            m.record_bot_reply(now);
        }
        // 0.15 + 0.4*(5/10) + 0.2*(10/10) + 0.25*1 = 0.80
        assert!((m.intimacy(now) - 0.80).abs() < 0.01);
    }

    #[test]
    fn intimacy_never_exceeds_one() {
        let now = Utc::now();
        let mut m = MemberStats::new(now - Duration::days(100));
        m.record_message(now, "hi", true);
        for _ in 0..50 {
            m.record_bot_reply(now);
        }
        assert!(m.intimacy(now) <= 1.0);
    }

    #[test]
    fn message_rate_saturates() {
        let now = Utc::now();
        let mut m = MemberStats::new(now);
        for _ in 0..10 {
            m.record_message(now, "x", false);
        }
        assert!((m.message_rate(now) - 0.2).abs() < 0.001);
        // Old traffic does not count.
        let mut old = MemberStats::new(at(600));
        old.record_message(at(600), "x", false);
        assert_eq!(old.message_rate(now), 0.0);
    }

    #[test]
    fn repetition_counts_normalized_duplicates() {
        let now = Utc::now();
        let mut m = MemberStats::new(now);
        m.record_message(now, "在吗", false);
        assert_eq!(m.repetition(now), 0.0);

        m.record_message(now, "在吗！", false); // normalizes equal
        m.record_message(now, "在 吗", false);
        // max occurrences = 3 → (3-1)/3 ≈ 0.667
        assert!((m.repetition(now) - 2.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn recent_buffer_is_bounded() {
        let now = Utc::now();
        let mut m = MemberStats::new(now);
        for i in 0..40 {
            m.record_message(now, &format!("m{i}"), false);
        }
        assert_eq!(m.recent.len(), 30);
        assert_eq!(m.recent.front().unwrap().raw, "m10");
    }

    #[test]
    fn urgency_scales_with_burst_size() {
        let now = Utc::now();
        let mut m = MemberStats::new(now);
        for _ in 0..5 {
            m.record_message(now, "求助", false);
        }
        // n=5 saturates the burst term: 0.6 + 0.2*intimacy + 0.2*0
        let expected = 0.6 + 0.2 * m.intimacy(now);
        assert!((m.urgency(now) - expected).abs() < 0.01);
    }
}
