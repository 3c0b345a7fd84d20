//! Send pipeline: simulated typing latency, segment pacing and
//! cooperative cancellation. The typing token acquired here is the only
//! cancellation primitive — fresh traffic trips it, and every sleep
//! boundary polls it.

use std::sync::Arc;
use std::time::Duration;

use super::utterance::plan_utterances;
use crate::config::BanterCfg;
use crate::dice::Dice;
use crate::error::Result;
use crate::io::ChatAdapter;
use crate::reply::DynamicStyle;
use crate::session::{SessionStore, TypingToken};
use crate::types::EnrichedEvent;

/// Explicit multi-send separator the model may emit.
const BRK: &str = "<brk>";
/// Hard cap on explicit `<brk>`/newline segments.
const MAX_BRK_SEGMENTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    pub sent: bool,
    pub cancelled: bool,
}

impl SendOutcome {
    fn sent() -> Self {
        Self { sent: true, cancelled: false }
    }

    fn cancelled() -> Self {
        Self { sent: false, cancelled: true }
    }
}

pub struct SendPipeline {
    cfg: Arc<BanterCfg>,
    sessions: Arc<SessionStore>,
    adapter: Arc<dyn ChatAdapter>,
}

impl SendPipeline {
    pub fn new(
        cfg: Arc<BanterCfg>,
        sessions: Arc<SessionStore>,
        adapter: Arc<dyn ChatAdapter>,
    ) -> Self {
        Self { cfg, sessions, adapter }
    }

    /// Deliver `text` for `event`, simulating typing. Returns early with
    /// `cancelled` when the typing token trips; the token is always
    /// released on exit, success or not.
    pub async fn send(
        &self,
        event: &EnrichedEvent,
        text: &str,
        style: &DynamicStyle,
        is_at_reply: bool,
        dice: &mut dyn Dice,
    ) -> Result<SendOutcome> {
        let session_key = event.event.session_key();
        let token = self.sessions.start_typing(&session_key);
        let result = self
            .send_inner(event, text, style, is_at_reply, &token, dice)
            .await;
        self.sessions.end_typing(&session_key, &token);
        result
    }

    async fn send_inner(
        &self,
        event: &EnrichedEvent,
        text: &str,
        style: &DynamicStyle,
        is_at_reply: bool,
        token: &TypingToken,
        dice: &mut dyn Dice,
    ) -> Result<SendOutcome> {
        let session_key = event.event.session_key();
        let group_id = event.event.group_id.clone();
        let reply_to = self.decide_reply_to(event, &session_key);

        let plan = plan_utterances(text, style, is_at_reply, dice);

        // Whole-reply typing delay, clamped to a believable band.
        let chars = text.chars().count() as u64;
        let typing_ms = (self.cfg.typing_base_ms
            + self.cfg.typing_per_char_ms * chars
            + dice.jitter(0, self.cfg.typing_jitter_ms))
        .clamp(self.cfg.typing_min_ms, self.cfg.typing_max_ms);
        if sleep_checked(typing_ms, token).await {
            tracing::debug!(session = %session_key, "send cancelled during typing delay");
            return Ok(SendOutcome::cancelled());
        }

        if text.contains(BRK) || text.contains('\n') {
            return self
                .send_explicit_segments(&group_id, &session_key, text, reply_to.as_deref(), token, dice)
                .await;
        }

        for (i, segment) in plan.segments.iter().enumerate() {
            if segment.delay_ms > 0 && sleep_checked(segment.delay_ms, token).await {
                tracing::debug!(session = %session_key, segment = i, "send cancelled between utterances");
                return Ok(SendOutcome::cancelled());
            }
            let quote = if i == 0 { reply_to.as_deref() } else { None };
            self.adapter
                .send_text(&group_id, &segment.text, quote)
                .await?;
        }
        Ok(SendOutcome::sent())
    }

    /// Model-directed splitting: `<brk>` first, then newlines, first three
    /// non-empty segments.
    async fn send_explicit_segments(
        &self,
        group_id: &str,
        session_key: &str,
        text: &str,
        reply_to: Option<&str>,
        token: &TypingToken,
        dice: &mut dyn Dice,
    ) -> Result<SendOutcome> {
        let segments: Vec<&str> = text
            .split(BRK)
            .flat_map(|part| part.split('\n'))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(MAX_BRK_SEGMENTS)
            .collect();

        let mut prev_chars = 0u64;
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                let delay = (self.cfg.segment_base_ms
                    + self.cfg.segment_per_char_ms * prev_chars
                    + dice.jitter(0, self.cfg.segment_jitter_ms))
                .min(self.cfg.segment_cap_ms);
                if sleep_checked(delay, token).await {
                    tracing::debug!(session = %session_key, segment = i, "send cancelled between segments");
                    return Ok(SendOutcome::cancelled());
                }
            }
            let quote = if i == 0 { reply_to } else { None };
            self.adapter.send_text(group_id, segment, quote).await?;
            prev_chars = segment.chars().count() as u64;
        }
        Ok(SendOutcome::sent())
    }

    /// Quote only when forced by a prior interruption or when the target
    /// has already scrolled `quote_gap_threshold` messages away.
    fn decide_reply_to(&self, event: &EnrichedEvent, session_key: &str) -> Option<String> {
        let target = event.quote_target.as_ref()?;
        if target.message_id.is_empty() || target.message_id == "0" {
            return None;
        }
        let view = self.sessions.view(session_key);
        let gap = view.message_seq.saturating_sub(target.seq);
        if view.force_quote_next_flush || gap >= self.cfg.quote_gap_threshold {
            Some(target.message_id.clone())
        } else {
            None
        }
    }
}

/// Sleep `ms`, aborting early on cancellation. Returns true when the
/// token was cancelled before, during or right after the sleep.
async fn sleep_checked(ms: u64, token: &TypingToken) -> bool {
    if token.is_cancelled() {
        return true;
    }
    tokio::select! {
        _ = token.cancelled() => true,
        _ = tokio::time::sleep(Duration::from_millis(ms)) => token.is_cancelled(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::FixedDice;
    use crate::io::RecordingAdapter;
    use crate::types::{ChatEvent, QuoteTarget};
    use chrono::Utc;

    fn event(seq: u64) -> EnrichedEvent {
        EnrichedEvent::new(
            ChatEvent {
                platform: "qq".into(),
                group_id: "g1".into(),
                user_id: "u1".into(),
                message_id: format!("m{seq}"),
                raw_text: "在吗".into(),
                timestamp: None,
                ingest_time: Some(Utc::now()),
                mentions_bot: false,
                from_bot: false,
                user_name: None,
                group_name: None,
                is_private: false,
            },
            seq,
        )
    }

    fn style() -> DynamicStyle {
        DynamicStyle {
            tone: None,
            slang: None,
            intimacy: None,
            verbosity: 0.4,
            multi_utterance_preference: 0.3,
        }
    }

    fn pipeline(adapter: Arc<RecordingAdapter>) -> (SendPipeline, Arc<SessionStore>) {
        let sessions = Arc::new(SessionStore::new());
        let pipeline = SendPipeline::new(
            Arc::new(BanterCfg::default()),
            Arc::clone(&sessions),
            adapter,
        );
        (pipeline, sessions)
    }

    #[tokio::test(start_paused = true)]
    async fn plain_reply_sends_one_message() {
        let adapter = Arc::new(RecordingAdapter::new());
        let (pipeline, sessions) = pipeline(adapter.clone());
        let mut dice = FixedDice::always(0.5);

        let outcome = pipeline
            .send(&event(1), "嗯嗯", &style(), false, &mut dice)
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::sent());
        assert_eq!(adapter.sent_count(), 1);
        assert_eq!(adapter.sent()[0].text, "嗯嗯");
        assert!(adapter.sent()[0].reply_to.is_none());
        assert!(!sessions.view("qq:g1").typing_active);
    }

    #[tokio::test(start_paused = true)]
    async fn brk_reply_splits_into_segments() {
        let adapter = Arc::new(RecordingAdapter::new());
        let (pipeline, _) = pipeline(adapter.clone());
        let mut dice = FixedDice::always(0.5);

        let outcome = pipeline
            .send(&event(1), "第一段<brk>第二段<brk>第三段<brk>第四段", &style(), false, &mut dice)
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::sent());
        // Capped at three segments.
        let sent = adapter.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].text, "第一段");
        assert_eq!(sent[2].text, "第三段");
    }

    #[tokio::test(start_paused = true)]
    async fn quote_used_when_gap_is_large() {
        let adapter = Arc::new(RecordingAdapter::new());
        let (pipeline, sessions) = pipeline(adapter.clone());
        let mut dice = FixedDice::always(0.5);

        // Session has advanced to seq 5; target was seq 1 → gap 4 ≥ 3.
        for _ in 0..5 {
            sessions.next_message_seq("qq:g1");
        }
        let mut ev = event(5);
        ev.quote_target = Some(QuoteTarget {
            message_id: "m1".into(),
            user_id: "u1".into(),
            seq: 1,
            text: "在吗".into(),
        });

        pipeline.send(&ev, "来了来了", &style(), false, &mut dice).await.unwrap();
        assert_eq!(adapter.sent()[0].reply_to.as_deref(), Some("m1"));
    }

    #[tokio::test(start_paused = true)]
    async fn quote_skipped_for_fresh_target() {
        let adapter = Arc::new(RecordingAdapter::new());
        let (pipeline, sessions) = pipeline(adapter.clone());
        let mut dice = FixedDice::always(0.5);

        sessions.next_message_seq("qq:g1");
        let mut ev = event(1);
        ev.quote_target = Some(QuoteTarget {
            message_id: "m1".into(),
            user_id: "u1".into(),
            seq: 1,
            text: "在吗".into(),
        });

        pipeline.send(&ev, "来了", &style(), false, &mut dice).await.unwrap();
        assert!(adapter.sent()[0].reply_to.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn force_quote_overrides_gap_rule() {
        let adapter = Arc::new(RecordingAdapter::new());
        let (pipeline, sessions) = pipeline(adapter.clone());
        let mut dice = FixedDice::always(0.5);

        sessions.next_message_seq("qq:g1");
        sessions.mark_force_quote_next_flush("qq:g1");
        let mut ev = event(1);
        ev.quote_target = Some(QuoteTarget {
            message_id: "m1".into(),
            user_id: "u1".into(),
            seq: 1,
            text: "在吗".into(),
        });

        pipeline.send(&ev, "刚刚在忙", &style(), false, &mut dice).await.unwrap();
        assert_eq!(adapter.sent()[0].reply_to.as_deref(), Some("m1"));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_message_id_never_quotes() {
        let adapter = Arc::new(RecordingAdapter::new());
        let (pipeline, sessions) = pipeline(adapter.clone());
        let mut dice = FixedDice::always(0.5);

        sessions.mark_force_quote_next_flush("qq:g1");
        let mut ev = event(1);
        ev.quote_target = Some(QuoteTarget {
            message_id: "0".into(),
            user_id: "u1".into(),
            seq: 1,
            text: "在吗".into(),
        });

        pipeline.send(&ev, "好", &style(), false, &mut dice).await.unwrap();
        assert!(adapter.sent()[0].reply_to.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn interruption_mid_send_stops_remaining_segments() {
        let adapter = Arc::new(RecordingAdapter::new());
        let (pipeline, sessions) = pipeline(adapter.clone());
        let sessions_bg = Arc::clone(&sessions);
        let adapter_bg = Arc::clone(&adapter);

        // Once the first segment is out, simulate three users piling in
        // while the bot is still typing segment two.
        let watcher = tokio::spawn(async move {
            while adapter_bg.sent_count() < 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            for _ in 0..3 {
                sessions_bg.note_incoming("qq:g1", 3);
            }
        });

        let mut dice = FixedDice::always(0.5);
        let outcome = pipeline
            .send(
                &event(1),
                "第一段<brk>第二段<brk>第三段",
                &style(),
                false,
                &mut dice,
            )
            .await
            .unwrap();
        watcher.await.unwrap();

        assert_eq!(outcome, SendOutcome::cancelled());
        // At most the first segment went out before the interruption.
        assert!(adapter.sent_count() <= 1);
        assert!(!sessions.view("qq:g1").typing_active);
    }

    #[tokio::test(start_paused = true)]
    async fn adapter_failure_aborts_but_releases_token() {
        let adapter = Arc::new(RecordingAdapter::new());
        adapter.fail_after(1);
        let (pipeline, sessions) = pipeline(adapter.clone());
        let mut dice = FixedDice::always(0.5);

        let result = pipeline
            .send(&event(1), "一<brk>二<brk>三", &style(), false, &mut dice)
            .await;
        assert!(result.is_err());
        assert_eq!(adapter.sent_count(), 1);
        assert!(!sessions.view("qq:g1").typing_active);
    }
}
