use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Event types ────────────────────────────────────────────────

/// Normalized inbound message handed over by a platform adapter.
/// Immutable once ingested; orchestration state lives on [`EnrichedEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    pub platform: String,
    pub group_id: String,
    pub user_id: String,
    pub message_id: String,
    pub raw_text: String,
    /// When the platform says the message was produced.
    pub timestamp: Option<DateTime<Utc>>,
    /// When this process first observed the event. Filled by the
    /// orchestrator when the adapter leaves it unset.
    pub ingest_time: Option<DateTime<Utc>>,
    pub mentions_bot: bool,
    pub from_bot: bool,
    pub user_name: Option<String>,
    pub group_name: Option<String>,
    pub is_private: bool,
}

impl ChatEvent {
    /// Session scope: one conversation channel.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.platform, self.group_id)
    }

    /// Debounce scope: one sender inside one channel.
    pub fn user_key(&self) -> String {
        format!("{}:{}:{}", self.platform, self.group_id, self.user_id)
    }

    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or(&self.user_id)
    }

    /// Message production time, falling back to ingest time, falling back
    /// to now (only reachable before the orchestrator stamps ingest_time).
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.timestamp
            .or(self.ingest_time)
            .unwrap_or_else(Utc::now)
    }

    /// Command prefix recognition: `/` or full-width `！`.
    pub fn is_command(&self) -> bool {
        let t = self.raw_text.trim_start();
        t.starts_with('/') || t.starts_with('！')
    }
}

/// Reference to the user turn a reply should quote via the platform's
/// native reply mechanism.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteTarget {
    pub message_id: String,
    pub user_id: String,
    pub seq: u64,
    pub text: String,
}

/// A [`ChatEvent`] once the orchestrator owns it: per-session sequence
/// number plus debounce-derived attachments. The public event itself is
/// never mutated.
#[derive(Debug, Clone)]
pub struct EnrichedEvent {
    pub event: ChatEvent,
    pub seq: u64,
    /// Space-joined burst text when this event came out of a debounce flush.
    pub merged_text: Option<String>,
    pub quote_target: Option<QuoteTarget>,
}

impl EnrichedEvent {
    pub fn new(event: ChatEvent, seq: u64) -> Self {
        Self { event, seq, merged_text: None, quote_target: None }
    }

    /// The text the planner and prompt should see: the merged burst when
    /// present, the single raw text otherwise.
    pub fn text(&self) -> &str {
        self.merged_text.as_deref().unwrap_or(&self.event.raw_text)
    }
}

// ── Conversation log types ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnRole {
    User,
    Bot,
}

/// One stored message in the per-channel conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_name: Option<String>,
    pub mentions_bot: bool,
    pub is_command: bool,
}

impl ChatTurn {
    pub fn from_event(event: &ChatEvent) -> Self {
        Self {
            role: if event.from_bot { TurnRole::Bot } else { TurnRole::User },
            content: event.raw_text.clone(),
            timestamp: event.effective_time(),
            user_id: event.user_id.clone(),
            user_name: event.user_name.clone(),
            mentions_bot: event.mentions_bot,
            is_command: event.is_command(),
        }
    }

    pub fn bot(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: TurnRole::Bot,
            content: content.into(),
            timestamp,
            user_id: "bot".to_owned(),
            user_name: None,
            mentions_bot: false,
            is_command: false,
        }
    }

    pub fn is_bot(&self) -> bool {
        self.role == TurnRole::Bot
    }
}

// ── Stats types ────────────────────────────────────────────────

/// Recent-pattern classification of a sender's message stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpamType {
    #[default]
    Normal,
    HelpSeeking,
    MemePlay,
    Noise,
}

impl SpamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::HelpSeeking => "help_seeking",
            Self::MemePlay => "meme_play",
            Self::Noise => "noise",
        }
    }
}

/// Everything the planner reads about one event, precomputed by the
/// stats/energy/activity services. Keeping this a plain struct keeps the
/// planner a pure function.
#[derive(Debug, Clone, Default)]
pub struct PlanSignals {
    /// Milliseconds since the bot last replied in this session, if ever.
    pub since_last_bot_ms: Option<i64>,
    pub intimacy: f32,
    pub spam: SpamType,
    pub urgency: f32,
    pub repetition: f32,
    pub meme_score: f32,
    pub group_activity: f32,
    pub energy: f32,
}

// ── Planner types ──────────────────────────────────────────────

/// How the bot intends to reply (or not).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplyMode {
    Ignore,
    Command,
    Smalltalk,
    Casual,
    Fragment,
    DirectAnswer,
    PassiveAcknowledge,
    PlayfulTease,
    EmpathySupport,
    Deflect,
}

impl ReplyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Command => "command",
            Self::Smalltalk => "smalltalk",
            Self::Casual => "casual",
            Self::Fragment => "fragment",
            Self::DirectAnswer => "direct_answer",
            Self::PassiveAcknowledge => "passive_acknowledge",
            Self::PlayfulTease => "playful_tease",
            Self::EmpathySupport => "empathy_support",
            Self::Deflect => "deflect",
        }
    }
}

/// Factor breakdown attached to every plan, kept for the debug surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanMeta {
    pub probability: f32,
    pub base_interest: f32,
    pub social_attention: f32,
    pub energy: f32,
    pub group_activity: f32,
    pub spam: SpamType,
    pub reason: String,
}

/// Output of the planner for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    pub should_reply: bool,
    pub mode: ReplyMode,
    pub delay_ms: u64,
    pub meta: PlanMeta,
}

impl PlanResult {
    pub fn ignore(reason: impl Into<String>) -> Self {
        Self {
            should_reply: false,
            mode: ReplyMode::Ignore,
            delay_ms: 0,
            meta: PlanMeta { reason: reason.into(), ..PlanMeta::default() },
        }
    }

    pub fn reply(mode: ReplyMode, delay_ms: u64) -> Self {
        Self {
            should_reply: true,
            mode,
            delay_ms,
            meta: PlanMeta::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str) -> ChatEvent {
        ChatEvent {
            platform: "qq".into(),
            group_id: "g1".into(),
            user_id: "u1".into(),
            message_id: "m1".into(),
            raw_text: text.into(),
            timestamp: None,
            ingest_time: Some(Utc::now()),
            mentions_bot: false,
            from_bot: false,
            user_name: Some("小明".into()),
            group_name: None,
            is_private: false,
        }
    }

    #[test]
    fn session_and_user_keys() {
        let e = event("hello");
        assert_eq!(e.session_key(), "qq:g1");
        assert_eq!(e.user_key(), "qq:g1:u1");
    }

    #[test]
    fn command_prefixes() {
        assert!(event("/help").is_command());
        assert!(event("！状态").is_command());
        assert!(!event("help me").is_command());
        assert!(!event("嗯？/").is_command());
    }

    #[test]
    fn effective_time_prefers_platform_timestamp() {
        let mut e = event("hi");
        let produced = Utc::now() - chrono::Duration::seconds(90);
        e.timestamp = Some(produced);
        assert_eq!(e.effective_time(), produced);

        e.timestamp = None;
        assert_eq!(e.effective_time(), e.ingest_time.unwrap());
    }

    #[test]
    fn enriched_text_prefers_merged() {
        let mut ev = EnrichedEvent::new(event("bot?"), 3);
        assert_eq!(ev.text(), "bot?");
        ev.merged_text = Some("hello are you there bot?".into());
        assert_eq!(ev.text(), "hello are you there bot?");
    }

    #[test]
    fn turn_from_event_carries_role() {
        let mut e = event("hi");
        let t = ChatTurn::from_event(&e);
        assert_eq!(t.role, TurnRole::User);
        assert!(!t.is_command);

        e.from_bot = true;
        assert_eq!(ChatTurn::from_event(&e).role, TurnRole::Bot);
    }

    #[test]
    fn plan_result_constructors() {
        let p = PlanResult::ignore("cooldown-hard");
        assert!(!p.should_reply);
        assert_eq!(p.mode, ReplyMode::Ignore);
        assert_eq!(p.meta.reason, "cooldown-hard");

        let p = PlanResult::reply(ReplyMode::Smalltalk, 600);
        assert!(p.should_reply);
        assert_eq!(p.delay_ms, 600);
    }
}
