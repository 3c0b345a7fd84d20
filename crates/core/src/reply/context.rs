//! Context builder: selects the HISTORICAL + NEW_WINDOW turn slices around
//! the last bot turn, merges same-speaker runs and produces a topic hint.

use chrono::{DateTime, Utc};

use crate::convo::ConversationStore;
use crate::lingo;
use crate::types::ChatTurn;

/// How many stored turns to consider at all.
const FETCH_LIMIT: usize = 40;
/// Pre-bot turns kept when the bot spoke recently.
const HISTORICAL_BEFORE_BOT: usize = 5;
/// Candidate tail when the bot has been quiet.
const QUIET_TAIL: usize = 6;
/// Final cap on turns handed to the prompt.
const MAX_TURNS: usize = 12;
/// Same-speaker turns this close together read as one message.
const RUN_MERGE_GAP_MS: i64 = 5000;
/// "Recently" for the same-topic heuristic.
const SAME_TOPIC_WINDOW_MS: i64 = 120_000;

#[derive(Debug, Clone, Default)]
pub struct ContextMeta {
    pub since_last_bot_ms: Option<i64>,
    pub messages_in_window: usize,
    pub is_same_topic: bool,
}

/// Prompt-ready slice of the conversation.
#[derive(Debug, Clone, Default)]
pub struct ReplyContext {
    /// Oldest first, capped at [`MAX_TURNS`]. The turns absorbed into
    /// `target_turn` are already removed — the prompt renders the target
    /// in its own block and must not see them twice.
    pub recent_turns: Vec<ChatTurn>,
    /// The (possibly merged) turn the reply addresses.
    pub target_turn: Option<ChatTurn>,
    pub topic_summary: Option<String>,
    pub meta: ContextMeta,
}

pub fn build_context(store: &ConversationStore, session_key: &str, now: DateTime<Utc>) -> ReplyContext {
    let turns = store.recent_turns(session_key, FETCH_LIMIT);
    if turns.is_empty() {
        return ReplyContext::default();
    }

    let last_bot_index = turns.iter().rposition(|t| t.is_bot());
    let since_last_bot_ms =
        last_bot_index.map(|i| (now - turns[i].timestamp).num_milliseconds());

    let mut candidate: Vec<ChatTurn> = match (last_bot_index, since_last_bot_ms) {
        (Some(idx), Some(since)) if since < SAME_TOPIC_WINDOW_MS => {
            let start = idx.saturating_sub(HISTORICAL_BEFORE_BOT);
            turns[start..].to_vec()
        }
        _ => {
            let start = turns.len().saturating_sub(QUIET_TAIL);
            turns[start..].to_vec()
        }
    };

    let messages_in_window = match last_bot_index {
        Some(idx) => turns.len() - idx - 1,
        None => candidate.len(),
    };

    // Topic hint looks at the whole candidate, target run included.
    let topic_summary = topic_hint(&candidate, last_bot_index.is_some());

    let (target_turn, run_start) = match merge_trailing_run(&candidate) {
        Some((turn, start)) => (Some(turn), start),
        None => (None, candidate.len()),
    };
    // The target run lives in its own prompt block; drop it here so the
    // prompt never renders those turns twice.
    candidate.truncate(run_start);

    let skip = candidate.len().saturating_sub(MAX_TURNS);
    let recent_turns: Vec<ChatTurn> = candidate.into_iter().skip(skip).collect();

    ReplyContext {
        recent_turns,
        target_turn,
        topic_summary,
        meta: ContextMeta {
            since_last_bot_ms,
            messages_in_window,
            is_same_topic: since_last_bot_ms
                .is_some_and(|s| s < SAME_TOPIC_WINDOW_MS)
                && messages_in_window > 1,
        },
    }
}

/// Walk backwards from the newest turn while the speaker stays the same
/// and the gap stays under 5 s, then merge the run into a single target.
/// Returns the merged turn plus the index where the run starts, so the
/// caller can cut the absorbed turns out of the context slice.
fn merge_trailing_run(candidate: &[ChatTurn]) -> Option<(ChatTurn, usize)> {
    let last = candidate.last()?;
    let mut start = candidate.len() - 1;
    while start > 0 {
        let prior = &candidate[start - 1];
        let target = &candidate[start];
        let gap = (target.timestamp - prior.timestamp).num_milliseconds();
        if prior.user_id == target.user_id && !prior.is_bot() && gap <= RUN_MERGE_GAP_MS {
            start -= 1;
        } else {
            break;
        }
    }

    if start == candidate.len() - 1 {
        return Some((last.clone(), start));
    }

    let content = candidate[start..]
        .iter()
        .map(|t| t.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let mut merged = last.clone();
    merged.content = content;
    Some((merged, start))
}

/// First-match-wins topic hint over the turns after the last bot reply.
fn topic_hint(recent: &[ChatTurn], has_bot_turn: bool) -> Option<String> {
    let new_window: Vec<&ChatTurn> = if has_bot_turn {
        let idx = recent.iter().rposition(|t| t.is_bot());
        match idx {
            Some(i) => recent[i + 1..].iter().collect(),
            None => recent.iter().collect(),
        }
    } else {
        recent.iter().collect()
    };
    let joined: String = new_window
        .iter()
        .map(|t| t.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    if lingo::has_question_mark(&joined) {
        Some("刚刚在问问题或讨论某个疑问".to_owned())
    } else if lingo::emoji_density(&joined) > 0.3 {
        Some("在刷表情斗图".to_owned())
    } else if joined.contains('@') {
        Some("在互相@着起哄".to_owned())
    } else if lingo::has_laughter(&joined) {
        Some("气氛很欢乐".to_owned())
    } else {
        None
    }
}
