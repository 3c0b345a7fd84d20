//! Orchestrator: wires ingestion, debouncing, session queues, turn-taking
//! and the reply/send pipelines. One instance serves every session; work
//! is serialized per session through the [`SessionStore`] queues and runs
//! concurrently across sessions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;

use crate::activity::GroupActivityTracker;
use crate::config::BanterCfg;
use crate::convo::ConversationStore;
use crate::dice::{Dice, ThreadDice};
use crate::energy::EnergyMeter;
use crate::guard::{self, GuardDecision};
use crate::ingest::{classify, DebounceSnapshot, Debouncer, Preprocessor};
use crate::io::{ChatAdapter, ChatClient, CommandDispatcher};
use crate::lingo;
use crate::reply::{ReplyOutcome, ReplyPipeline};
use crate::send::SendPipeline;
use crate::session::SessionStore;
use crate::stats::StatsRegistry;
use crate::status::EngineStatus;
use crate::types::{ChatEvent, EnrichedEvent, PlanResult, QuoteTarget, ReplyMode};

/// How many trailing burst messages make up the merged planner text.
const MERGE_TAIL: usize = 6;
/// Burst size at which the quote target is chosen by scoring instead of
/// defaulting to the last message.
const QUOTE_SCORING_MIN: usize = 3;

pub type DiceFactory = Arc<dyn Fn() -> Box<dyn Dice> + Send + Sync>;

struct Engine {
    cfg: Arc<BanterCfg>,
    sessions: Arc<SessionStore>,
    debouncer: Arc<Debouncer>,
    store: Arc<ConversationStore>,
    stats: Arc<StatsRegistry>,
    energy: Arc<EnergyMeter>,
    activity: Arc<GroupActivityTracker>,
    preprocessor: Preprocessor,
    llm: Option<Arc<dyn ChatClient>>,
    adapter: Arc<dyn ChatAdapter>,
    commands: Arc<dyn CommandDispatcher>,
    dice_factory: DiceFactory,

    // Debug surface.
    last_plans: DashMap<String, PlanResult>,
    last_prompts: DashMap<String, String>,
    last_mode: Mutex<Option<ReplyMode>>,
    replies_sent: AtomicU64,
    status_tx: watch::Sender<EngineStatus>,
}

/// Cheap-clone handle to the engine; spawned session tasks capture clones.
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<Engine>,
}

impl Orchestrator {
    pub fn new(
        cfg: BanterCfg,
        adapter: Arc<dyn ChatAdapter>,
        llm: Option<Arc<dyn ChatClient>>,
        commands: Arc<dyn CommandDispatcher>,
    ) -> Self {
        Self::with_dice_factory(cfg, adapter, llm, commands, Arc::new(|| Box::new(ThreadDice)))
    }

    /// Injectable dice for deterministic tests.
    pub fn with_dice_factory(
        cfg: BanterCfg,
        adapter: Arc<dyn ChatAdapter>,
        llm: Option<Arc<dyn ChatClient>>,
        commands: Arc<dyn CommandDispatcher>,
        dice_factory: DiceFactory,
    ) -> Self {
        let cfg = Arc::new(cfg);
        let store = Arc::new(ConversationStore::new(cfg.ring_max_turns));
        let stats = Arc::new(StatsRegistry::new());
        let activity = Arc::new(GroupActivityTracker::new(
            cfg.activity_window_ms,
            cfg.activity_normalizer,
        ));
        let preprocessor = Preprocessor::new(
            Arc::clone(&store),
            Arc::clone(&stats),
            Arc::clone(&activity),
            cfg.stale_max_event_lag_ms,
        );
        let (status_tx, _) = watch::channel(EngineStatus::default());
        Self {
            engine: Arc::new(Engine {
                sessions: Arc::new(SessionStore::new()),
                debouncer: Arc::new(Debouncer::new(cfg.debounce_delay_ms)),
                energy: Arc::new(EnergyMeter::new(
                    cfg.energy_recovery_per_minute,
                    cfg.energy_cost_per_reply,
                )),
                store,
                stats,
                activity,
                preprocessor,
                llm,
                adapter,
                commands,
                dice_factory,
                cfg,
                last_plans: DashMap::new(),
                last_prompts: DashMap::new(),
                last_mode: Mutex::new(None),
                replies_sent: AtomicU64::new(0),
                status_tx,
            }),
        }
    }

    /// Single inbound entry point. Never returns an error: everything is
    /// logged and absorbed so the adapter can fire-and-forget.
    pub async fn handle_event(&self, mut event: ChatEvent) {
        let engine = &self.engine;
        if event.ingest_time.is_none() {
            event.ingest_time = Some(Utc::now());
        }

        if let Some(halt) = engine.preprocessor.preprocess(&event) {
            tracing::debug!(
                session = %event.session_key(),
                halt = ?halt,
                "event stopped at preprocessing"
            );
            self.publish_status();
            return;
        }

        let session_key = event.session_key();
        let seq = engine.sessions.next_message_seq(&session_key);

        // Typing interruption: fresh traffic counts against any in-flight
        // send, and tripping it pins the force-quote flag for the next
        // flush.
        if let Some((count, tripped)) = engine
            .sessions
            .note_incoming(&session_key, engine.cfg.interrupt_threshold)
            && tripped
        {
            engine.sessions.mark_force_quote_next_flush(&session_key);
            tracing::info!(
                session = %session_key,
                incoming = count,
                "in-flight send interrupted by fresh traffic"
            );
        }

        let enriched = EnrichedEvent::new(event, seq);
        let classification = classify(&enriched.event);
        if classification.is_command || classification.is_mention {
            let this = self.clone();
            engine.sessions.run_queued(&session_key, async move {
                this.process_event(enriched).await;
            });
        } else {
            let this = self.clone();
            engine.debouncer.debounce(enriched, move |snapshot| {
                let session_key = snapshot.last_event().event.session_key();
                let orchestrator = this.clone();
                this.engine.sessions.run_queued(&session_key, async move {
                    orchestrator.handle_debounced(snapshot).await;
                });
            });
        }
        self.publish_status();
    }

    /// Runs on the session queue once a debounce window flushes.
    async fn handle_debounced(&self, snapshot: DebounceSnapshot) {
        let engine = &self.engine;
        let count = snapshot.count();
        let last = snapshot.last_event().clone();
        let session_key = last.event.session_key();

        let merged_text = snapshot
            .events
            .iter()
            .rev()
            .take(MERGE_TAIL)
            .rev()
            .map(|e| e.event.raw_text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let quote_target = if count >= QUOTE_SCORING_MIN {
            pick_quote_target(&snapshot.events)
        } else {
            quote_of(&last)
        };

        let mut enriched = last;
        enriched.merged_text = Some(merged_text.clone());
        enriched.quote_target = Some(quote_target);

        let view = engine.sessions.view(&session_key);
        let since_last_bot_ms = view
            .last_bot_reply_at
            .map(|t| (Utc::now() - t).num_milliseconds());

        match guard::evaluate(
            view.force_quote_next_flush,
            since_last_bot_ms,
            count,
            &merged_text,
        ) {
            GuardDecision::Skip { reason } => {
                tracing::debug!(session = %session_key, reason, count, "flush skipped by guard");
            }
            GuardDecision::Allow { force_quote } => {
                if force_quote {
                    tracing::debug!(session = %session_key, "flush allowed with forced quote");
                }
                self.process_event(enriched).await;
            }
        }
        self.publish_status();
    }

    /// Shared command/conversational path, always on the session queue.
    async fn process_event(&self, event: EnrichedEvent) {
        let engine = &self.engine;
        let session_key = event.event.session_key();
        let classification = classify(&event.event);
        if classification.is_command {
            engine.commands.handle(&event).await;
            return;
        }

        // Pipelines are rebuilt per event so they always see the latest
        // injected collaborators.
        let reply_pipeline = ReplyPipeline::new(
            Arc::clone(&engine.cfg),
            Arc::clone(&engine.store),
            Arc::clone(&engine.stats),
            Arc::clone(&engine.energy),
            Arc::clone(&engine.activity),
            Arc::clone(&engine.sessions),
            engine.llm.clone(),
        );
        let send_pipeline = SendPipeline::new(
            Arc::clone(&engine.cfg),
            Arc::clone(&engine.sessions),
            Arc::clone(&engine.adapter),
        );
        let mut dice = (engine.dice_factory)();

        let outcome = match reply_pipeline.run(&event, dice.as_mut()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // LLM failure: the turn is skipped, nothing committed.
                tracing::warn!(session = %session_key, error = %e, "reply pipeline failed");
                return;
            }
        };

        match outcome {
            ReplyOutcome::Skip(plan) => {
                tracing::debug!(
                    session = %session_key,
                    reason = %plan.meta.reason,
                    probability = plan.meta.probability,
                    "planner skipped"
                );
                self.record_plan(&session_key, plan);
            }
            ReplyOutcome::NotConfigured { plan, receipt } => {
                self.record_plan(&session_key, plan);
                if let Err(e) = engine
                    .adapter
                    .send_text(&event.event.group_id, &receipt, None)
                    .await
                {
                    tracing::warn!(session = %session_key, error = %e, "receipt send failed");
                }
            }
            ReplyOutcome::Ready(prepared) => {
                engine
                    .last_prompts
                    .insert(session_key.clone(), prepared.prompt_flat.clone());
                self.record_plan(&session_key, prepared.plan.clone());

                match send_pipeline
                    .send(
                        &event,
                        &prepared.text,
                        &prepared.style,
                        prepared.is_at_reply,
                        dice.as_mut(),
                    )
                    .await
                {
                    Err(e) => {
                        tracing::warn!(session = %session_key, error = %e, "send pipeline failed");
                    }
                    Ok(outcome) if outcome.cancelled => {
                        // force_quote_next_flush was already pinned by the
                        // interruption path; the next flush quotes.
                        tracing::info!(session = %session_key, "send cancelled mid-typing");
                    }
                    Ok(_) => {
                        engine.sessions.clear_force_quote_next_flush(&session_key);
                        reply_pipeline.commit_reply(&event, &prepared);
                        engine
                            .sessions
                            .set_last_bot_reply_at(&session_key, Utc::now());
                        engine.replies_sent.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    }

    fn record_plan(&self, session_key: &str, plan: PlanResult) {
        *self.engine.last_mode.lock().unwrap() = Some(plan.mode);
        self.engine.last_plans.insert(session_key.to_owned(), plan);
    }

    fn publish_status(&self) {
        let engine = &self.engine;
        // watch::Sender::send only fails if all receivers dropped — benign.
        let _ = engine.status_tx.send(EngineStatus {
            sessions: engine.sessions.session_count(),
            pending_debounces: engine.debouncer.pending_count(),
            energy: engine.energy.read(),
            last_mode: *engine.last_mode.lock().unwrap(),
            replies_sent: engine.replies_sent.load(Ordering::Relaxed),
        });
    }

    /// Cancel debounce timers and in-flight typing. Buffered bursts are
    /// dropped; the conversation log keeps what was already preprocessed.
    pub fn shutdown(&self) {
        self.engine.debouncer.shutdown();
        self.engine.sessions.cancel_all_typing();
        tracing::info!("orchestrator shut down");
    }

    // ── Debug surface ──────────────────────────────────────────

    pub fn status_rx(&self) -> watch::Receiver<EngineStatus> {
        self.engine.status_tx.subscribe()
    }

    pub fn last_plan(&self, session_key: &str) -> Option<PlanResult> {
        self.engine.last_plans.get(session_key).map(|p| p.clone())
    }

    pub fn last_prompt(&self, session_key: &str) -> Option<String> {
        self.engine.last_prompts.get(session_key).map(|p| p.clone())
    }

    pub fn pending_debounces(&self) -> usize {
        self.engine.debouncer.pending_count()
    }

    pub fn energy(&self) -> f32 {
        self.engine.energy.read()
    }

    pub fn intimacy_of(&self, user_key: &str) -> Option<f32> {
        self.engine.stats.intimacy_of(user_key, Utc::now())
    }

    // ── Collaborator handles (tests, frontends) ────────────────

    pub fn conversation_store(&self) -> Arc<ConversationStore> {
        Arc::clone(&self.engine.store)
    }

    pub fn session_store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.engine.sessions)
    }
}

fn quote_of(event: &EnrichedEvent) -> QuoteTarget {
    QuoteTarget {
        message_id: event.event.message_id.clone(),
        user_id: event.event.user_id.clone(),
        seq: event.seq,
        text: event.event.raw_text.clone(),
    }
}

/// Score burst members for quotability: questions and substantial recent
/// messages win; ties go to the later arrival.
fn pick_quote_target(events: &[EnrichedEvent]) -> QuoteTarget {
    let n = events.len();
    let mut best = 0usize;
    let mut best_score = i32::MIN;
    for (i, e) in events.iter().enumerate() {
        let text = &e.event.raw_text;
        let mut score = 0;
        if lingo::has_question_mark(text) {
            score += 3;
        }
        if text.chars().count() >= 12 {
            score += 2;
        }
        if !lingo::is_punctuation_only(text) {
            score += 1;
        }
        if i + 2 >= n {
            score += 1;
        }
        // >= so a tie prefers the later arrival.
        if score >= best_score {
            best_score = score;
            best = i;
        }
    }
    quote_of(&events[best])
}
