mod member;
mod spam;

pub use member::{MemberSignals, MemberStats};
pub use spam::classify_spam;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::lingo;
use crate::types::SpamType;

/// Bounded per-group message buffer for meme-score computation.
const GROUP_BUFFER_CAP: usize = 60;
/// Window for repetition / meme / spam pattern checks.
const PATTERN_WINDOW_SECS: i64 = 120;

#[derive(Debug, Clone)]
pub(crate) struct GroupMessage {
    pub at: DateTime<Utc>,
    pub user_id: String,
    pub normalized: String,
}

#[derive(Debug, Default)]
struct GroupBuffer {
    messages: std::collections::VecDeque<GroupMessage>,
}

/// Member and group statistics service. Updated by the preprocessor and the
/// reply commit; read by the planner through [`MemberSignals`].
pub struct StatsRegistry {
    members: DashMap<String, MemberStats>,
    groups: DashMap<String, GroupBuffer>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self {
            members: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    /// Record one user message into member and group buffers.
    pub fn on_user_message(
        &self,
        user_key: &str,
        group_key: &str,
        user_id: &str,
        at: DateTime<Utc>,
        text: &str,
        mentions_bot: bool,
    ) {
        let mut member = self
            .members
            .entry(user_key.to_owned())
            .or_insert_with(|| MemberStats::new(at));
        member.record_message(at, text, mentions_bot);
        drop(member);

        let mut group = self.groups.entry(group_key.to_owned()).or_default();
        if group.messages.len() >= GROUP_BUFFER_CAP {
            group.messages.pop_front();
        }
        group.messages.push_back(GroupMessage {
            at,
            user_id: user_id.to_owned(),
            normalized: lingo::normalize(text),
        });
    }

    /// Record one bot reply directed at `user_key`.
    pub fn on_bot_reply(&self, user_key: &str, at: DateTime<Utc>) {
        let mut member = self
            .members
            .entry(user_key.to_owned())
            .or_insert_with(|| MemberStats::new(at));
        member.record_bot_reply(at);
    }

    /// Distinct users that sent a normalized-equal message within the
    /// pattern window: `(distinct − 1) / 4`, clamped.
    pub fn group_meme_score(&self, group_key: &str, text: &str, now: DateTime<Utc>) -> f32 {
        let Some(group) = self.groups.get(group_key) else {
            return 0.0;
        };
        let needle = lingo::normalize(text);
        if needle.is_empty() {
            return 0.0;
        }
        let cutoff = now - chrono::Duration::seconds(PATTERN_WINDOW_SECS);
        let mut users: Vec<&str> = group
            .messages
            .iter()
            .filter(|m| m.at >= cutoff && m.normalized == needle)
            .map(|m| m.user_id.as_str())
            .collect();
        users.sort();
        users.dedup();
        if users.is_empty() {
            return 0.0;
        }
        (((users.len() - 1) as f32) / 4.0).clamp(0.0, 1.0)
    }

    /// Everything the planner needs about the sender of `text`, in one read.
    pub fn signals(
        &self,
        user_key: &str,
        group_key: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> MemberSignals {
        let meme_score = self.group_meme_score(group_key, text, now);
        match self.members.get(user_key) {
            Some(member) => {
                let intimacy = member.intimacy(now);
                let spam = classify_spam(member.recent_within(now, PATTERN_WINDOW_SECS));
                let urgency = if spam == SpamType::HelpSeeking {
                    member.urgency(now)
                } else {
                    0.0
                };
                MemberSignals {
                    intimacy,
                    message_rate: member.message_rate(now),
                    repetition: member.repetition(now),
                    spam,
                    urgency,
                    meme_score,
                }
            }
            None => MemberSignals { meme_score, ..MemberSignals::default() },
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Debug accessor: intimacy for one member, if known.
    pub fn intimacy_of(&self, user_key: &str, now: DateTime<Utc>) -> Option<f32> {
        self.members.get(user_key).map(|m| m.intimacy(now))
    }
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
