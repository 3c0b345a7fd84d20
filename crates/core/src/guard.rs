//! Turn-taking guard: the last gate before a debounced snapshot reaches
//! the reply pipeline. Immediate paths (mentions, commands) never come
//! through here.

use crate::lingo;

/// Minimum quiet period after the bot's own reply before it will take
/// another unprompted turn.
const MIN_TURN_GAP_MS: i64 = 5000;
/// Burst size at which a follow-up question overrides the gap.
const FOLLOW_UP_MIN_COUNT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow { force_quote: bool },
    Skip { reason: &'static str },
}

/// Decide whether a flushed snapshot may proceed.
pub fn evaluate(
    force_quote_next_flush: bool,
    since_last_bot_ms: Option<i64>,
    count: usize,
    merged_text: &str,
) -> GuardDecision {
    if force_quote_next_flush {
        return GuardDecision::Allow { force_quote: true };
    }

    match since_last_bot_ms {
        None => GuardDecision::Allow { force_quote: false },
        Some(since) if since >= MIN_TURN_GAP_MS => GuardDecision::Allow { force_quote: false },
        Some(_) => {
            // Inside the gap: only a multi-message burst that is actually
            // asking something gets through.
            if count >= FOLLOW_UP_MIN_COUNT && lingo::is_question(merged_text) {
                GuardDecision::Allow { force_quote: false }
            } else {
                GuardDecision::Skip { reason: "turn-gap" }
            }
        }
    }
}
