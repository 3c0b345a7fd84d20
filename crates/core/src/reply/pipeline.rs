//! Reply pipeline: plan → wait → context → style → prompt → model.
//! Holds the generated text for the orchestrator to commit only after a
//! successful send.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::context::build_context;
use super::prompt::{build_messages, flatten_messages};
use super::style::{derive_style, DynamicStyle};
use crate::activity::GroupActivityTracker;
use crate::config::BanterCfg;
use crate::convo::ConversationStore;
use crate::dice::Dice;
use crate::energy::EnergyMeter;
use crate::error::Result;
use crate::io::ChatClient;
use crate::planner;
use crate::session::SessionStore;
use crate::stats::StatsRegistry;
use crate::types::{ChatTurn, EnrichedEvent, PlanResult, PlanSignals, ReplyMode};

/// A reply that is ready to send but not yet committed.
#[derive(Debug, Clone)]
pub struct PreparedReply {
    pub text: String,
    pub plan: PlanResult,
    pub style: DynamicStyle,
    pub is_at_reply: bool,
    /// Flattened prompt for the debug surface.
    pub prompt_flat: String,
}

#[derive(Debug, Clone)]
pub enum ReplyOutcome {
    /// Planner declined (or routed to the command path).
    Skip(PlanResult),
    /// Planner wanted a reply but no model is configured.
    NotConfigured { plan: PlanResult, receipt: String },
    Ready(Box<PreparedReply>),
}

pub struct ReplyPipeline {
    cfg: Arc<BanterCfg>,
    store: Arc<ConversationStore>,
    stats: Arc<StatsRegistry>,
    energy: Arc<EnergyMeter>,
    activity: Arc<GroupActivityTracker>,
    sessions: Arc<SessionStore>,
    llm: Option<Arc<dyn ChatClient>>,
}

impl ReplyPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: Arc<BanterCfg>,
        store: Arc<ConversationStore>,
        stats: Arc<StatsRegistry>,
        energy: Arc<EnergyMeter>,
        activity: Arc<GroupActivityTracker>,
        sessions: Arc<SessionStore>,
        llm: Option<Arc<dyn ChatClient>>,
    ) -> Self {
        Self { cfg, store, stats, energy, activity, sessions, llm }
    }

    /// Read every signal the planner needs at this instant.
    fn gather_signals(&self, event: &EnrichedEvent) -> PlanSignals {
        let now = Utc::now();
        let session_key = event.event.session_key();
        let member = self
            .stats
            .signals(&event.event.user_key(), &session_key, event.text(), now);
        let (_, group_activity) = self.activity.read(&session_key, now);
        let since_last_bot_ms = self
            .sessions
            .last_bot_reply_at(&session_key)
            .map(|t| (now - t).num_milliseconds());
        PlanSignals {
            since_last_bot_ms,
            intimacy: member.intimacy,
            spam: member.spam,
            urgency: member.urgency,
            repetition: member.repetition,
            meme_score: member.meme_score,
            group_activity,
            energy: self.energy.read(),
        }
    }

    pub async fn run(
        &self,
        event: &EnrichedEvent,
        dice: &mut dyn Dice,
    ) -> Result<ReplyOutcome> {
        let signals = self.gather_signals(event);
        let plan = planner::plan(
            event.text(),
            event.event.mentions_bot,
            &signals,
            &self.cfg,
            dice,
        );

        if !plan.should_reply || plan.mode == ReplyMode::Command {
            return Ok(ReplyOutcome::Skip(plan));
        }

        let Some(llm) = &self.llm else {
            let receipt = format!("[no LLM configured] received: {}", event.text());
            return Ok(ReplyOutcome::NotConfigured { plan, receipt });
        };

        if plan.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(plan.delay_ms)).await;
        }

        let session_key = event.event.session_key();
        let ctx = build_context(&self.store, &session_key, Utc::now());
        let style = derive_style(plan.mode, signals.intimacy, signals.energy, &self.cfg.persona);
        let messages = build_messages(&self.cfg.persona, &style, &ctx, None);
        let prompt_flat = flatten_messages(&messages);

        let text = llm.chat(messages).await?;
        let text = text.trim().to_owned();

        Ok(ReplyOutcome::Ready(Box::new(PreparedReply {
            text,
            plan,
            style,
            is_at_reply: event.event.mentions_bot,
            prompt_flat,
        })))
    }

    /// Post-send bookkeeping: log the bot turn, update reply stats, spend
    /// energy. Runs only after a fully successful send.
    pub fn commit_reply(&self, event: &EnrichedEvent, prepared: &PreparedReply) {
        let now = Utc::now();
        let session_key = event.event.session_key();
        self.store
            .append_turn(&session_key, ChatTurn::bot(prepared.text.clone(), now));
        self.stats.on_bot_reply(&event.event.user_key(), now);
        self.energy.on_reply_sent();
    }
}
