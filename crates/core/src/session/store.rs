use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::typing::TypingToken;

type QueuedTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Turn-taking state for one `platform:group_id` channel.
#[derive(Debug, Default)]
struct SessionState {
    last_bot_reply_at: Option<DateTime<Utc>>,
    force_quote_next_flush: bool,
    message_seq: u64,
    typing: Option<TypingToken>,
}

/// Read-only snapshot of a session for guards and planners.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub last_bot_reply_at: Option<DateTime<Utc>>,
    pub force_quote_next_flush: bool,
    pub message_seq: u64,
    pub typing_active: bool,
}

struct SessionEntry {
    state: Mutex<SessionState>,
    queue_tx: mpsc::UnboundedSender<QueuedTask>,
}

/// Per-session state plus the per-session FIFO work queues.
///
/// `run_queued` is the serialization primitive of the whole engine: tasks
/// submitted under the same key execute in submission order with no
/// overlap, tasks under different keys run concurrently. Each session owns
/// a worker task draining an unbounded channel, so a slow LLM call in one
/// group never stalls another.
pub struct SessionStore {
    sessions: DashMap<String, Arc<SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self { sessions: DashMap::new() }
    }

    fn entry(&self, key: &str) -> Arc<SessionEntry> {
        self.sessions
            .entry(key.to_owned())
            .or_insert_with(|| {
                let (tx, mut rx) = mpsc::unbounded_channel::<QueuedTask>();
                tokio::spawn(async move {
                    // Tasks resolve to () and carry their own error handling,
                    // so one failed turn cannot wedge the queue.
                    while let Some(task) = rx.recv().await {
                        task.await;
                    }
                });
                Arc::new(SessionEntry {
                    state: Mutex::new(SessionState::default()),
                    queue_tx: tx,
                })
            })
            .clone()
    }

    /// Submit work onto the session's FIFO queue.
    pub fn run_queued<F>(&self, key: &str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let entry = self.entry(key);
        // Send only fails when the worker is gone, i.e. at shutdown.
        if entry.queue_tx.send(Box::pin(fut)).is_err() {
            tracing::warn!(session = %key, "session queue closed, task dropped");
        }
    }

    /// Assign the next per-session sequence number (strictly monotone).
    pub fn next_message_seq(&self, key: &str) -> u64 {
        let entry = self.entry(key);
        let mut state = entry.state.lock().unwrap();
        state.message_seq += 1;
        state.message_seq
    }

    pub fn current_seq(&self, key: &str) -> u64 {
        self.entry(key).state.lock().unwrap().message_seq
    }

    /// Begin a typing phase: installs a fresh token (cancelling any stale
    /// one) and resets the incoming-while-typing counter.
    pub fn start_typing(&self, key: &str) -> TypingToken {
        let entry = self.entry(key);
        let token = TypingToken::new();
        let mut state = entry.state.lock().unwrap();
        if let Some(old) = state.typing.replace(token.clone()) {
            // Stale token from an abandoned send; only ever hit on bugs
            // upstream, but cancelling is always safe.
            old.cancel();
        }
        token
    }

    /// Clear the typing slot — only if `token` still owns it.
    pub fn end_typing(&self, key: &str, token: &TypingToken) {
        let entry = self.entry(key);
        let mut state = entry.state.lock().unwrap();
        if state.typing.as_ref().is_some_and(|t| t.id() == token.id()) {
            state.typing = None;
        }
    }

    /// Route one incoming user event to the active typing token, if any.
    /// Returns (count, tripped) when a token is active.
    pub fn note_incoming(&self, key: &str, threshold: u32) -> Option<(u32, bool)> {
        let entry = self.entry(key);
        let token = {
            let state = entry.state.lock().unwrap();
            state.typing.clone()
        };
        token.map(|t| t.note_incoming(threshold))
    }

    pub fn last_bot_reply_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entry(key).state.lock().unwrap().last_bot_reply_at
    }

    pub fn set_last_bot_reply_at(&self, key: &str, at: DateTime<Utc>) {
        self.entry(key).state.lock().unwrap().last_bot_reply_at = Some(at);
    }

    pub fn mark_force_quote_next_flush(&self, key: &str) {
        self.entry(key).state.lock().unwrap().force_quote_next_flush = true;
    }

    pub fn clear_force_quote_next_flush(&self, key: &str) {
        self.entry(key).state.lock().unwrap().force_quote_next_flush = false;
    }

    /// Snapshot for guards / debug accessors.
    pub fn view(&self, key: &str) -> SessionView {
        let entry = self.entry(key);
        let state = entry.state.lock().unwrap();
        SessionView {
            last_bot_reply_at: state.last_bot_reply_at,
            force_quote_next_flush: state.force_quote_next_flush,
            message_seq: state.message_seq,
            typing_active: state.typing.is_some(),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Cancel every active typing token (process shutdown).
    pub fn cancel_all_typing(&self) {
        for entry in self.sessions.iter() {
            let state = entry.value().state.lock().unwrap();
            if let Some(token) = &state.typing {
                token.cancel();
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
