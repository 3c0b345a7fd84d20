use std::sync::Arc;

use chrono::Duration;

use crate::activity::GroupActivityTracker;
use crate::convo::ConversationStore;
use crate::stats::StatsRegistry;
use crate::types::{ChatEvent, ChatTurn};

/// Orchestrator branch decision for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub is_command: bool,
    pub is_mention: bool,
}

/// Decide command / mention handling. Command recognition is prefix-only
/// (`/` or full-width `！`); the dispatcher re-checks on its side.
pub fn classify(event: &ChatEvent) -> Classification {
    Classification {
        is_command: event.is_command(),
        is_mention: event.mentions_bot,
    }
}

/// Why preprocessing stopped an event short of planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// Malformed event, dropped entirely (not even logged as a turn).
    Invalid,
    /// The bot's own message: logged for context, never planned.
    BotEcho,
    /// Arrived more than the lag budget after production without being a
    /// mention or command: logged for context, stats skipped.
    StaleBackfill,
}

/// First stage of the pipeline: validate, append to the conversation log,
/// update member stats and the group-activity window.
pub struct Preprocessor {
    store: Arc<ConversationStore>,
    stats: Arc<StatsRegistry>,
    activity: Arc<GroupActivityTracker>,
    max_event_lag: Duration,
}

impl Preprocessor {
    pub fn new(
        store: Arc<ConversationStore>,
        stats: Arc<StatsRegistry>,
        activity: Arc<GroupActivityTracker>,
        max_event_lag_ms: i64,
    ) -> Self {
        Self {
            store,
            stats,
            activity,
            max_event_lag: Duration::milliseconds(max_event_lag_ms),
        }
    }

    /// Returns `None` when the event should continue into classification
    /// and planning, `Some(halt)` when processing stops here.
    pub fn preprocess(&self, event: &ChatEvent) -> Option<Halt> {
        if event.raw_text.trim().is_empty()
            || event.group_id.trim().is_empty()
            || event.user_id.trim().is_empty()
        {
            tracing::warn!(
                platform = %event.platform,
                group = %event.group_id,
                user = %event.user_id,
                "malformed event dropped"
            );
            return Some(Halt::Invalid);
        }

        let session_key = event.session_key();
        self.store
            .append_turn(&session_key, ChatTurn::from_event(event));

        if event.from_bot {
            // Terminates regardless of mentions_bot.
            return Some(Halt::BotEcho);
        }

        let classification = classify(event);
        if let (Some(produced), Some(ingested)) = (event.timestamp, event.ingest_time)
            && ingested - produced > self.max_event_lag
            && !classification.is_mention
            && !classification.is_command
        {
            tracing::debug!(
                session = %session_key,
                lag_ms = (ingested - produced).num_milliseconds(),
                "stale backfill stored for context only"
            );
            return Some(Halt::StaleBackfill);
        }

        let at = event.effective_time();
        self.stats.on_user_message(
            &event.user_key(),
            &session_key,
            &event.user_id,
            at,
            &event.raw_text,
            event.mentions_bot,
        );
        self.activity.record(&session_key, at);
        None
    }
}
