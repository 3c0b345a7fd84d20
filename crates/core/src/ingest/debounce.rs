use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::types::EnrichedEvent;

/// The coalesced burst handed to the orchestrator when a window elapses.
#[derive(Debug, Clone)]
pub struct DebounceSnapshot {
    pub user_key: String,
    pub events: Vec<EnrichedEvent>,
    pub first_at: DateTime<Utc>,
    pub last_at: DateTime<Utc>,
}

impl DebounceSnapshot {
    pub fn count(&self) -> usize {
        self.events.len()
    }

    /// Never empty: a snapshot only exists because at least one event was
    /// buffered.
    pub fn last_event(&self) -> &EnrichedEvent {
        self.events.last().expect("snapshot holds at least one event")
    }
}

struct PendingDebounce {
    events: Vec<EnrichedEvent>,
    generation: u64,
    timer: CancellationToken,
    first_at: DateTime<Utc>,
    last_at: DateTime<Utc>,
}

/// Per-sender burst coalescing. Each `platform:group:user` key owns a
/// single pending window; a new event for the key resets the timer
/// (cancel-and-replace under the entry lock, so a superseded timer can
/// never deliver). The snapshot is flushed exactly once per surviving
/// generation.
pub struct Debouncer {
    delay: Duration,
    pending: Arc<DashMap<String, PendingDebounce>>,
    shutdown: CancellationToken,
}

impl Debouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            pending: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Buffer `event` under its user key; `on_flush` runs when the window
    /// elapses without further traffic from the same sender.
    pub fn debounce<F>(&self, event: EnrichedEvent, on_flush: F)
    where
        F: FnOnce(DebounceSnapshot) + Send + 'static,
    {
        let key = event.event.user_key();
        let now = Utc::now();
        let timer = CancellationToken::new();

        let generation = {
            let mut entry = self.pending.entry(key.clone()).or_insert_with(|| {
                PendingDebounce {
                    events: Vec::new(),
                    generation: 0,
                    timer: CancellationToken::new(),
                    first_at: now,
                    last_at: now,
                }
            });
            // Cancel the superseded timer before installing the new one.
            entry.timer.cancel();
            entry.timer = timer.clone();
            entry.generation += 1;
            entry.events.push(event);
            entry.last_at = now;
            entry.generation
        };

        let pending = Arc::clone(&self.pending);
        let shutdown = self.shutdown.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // Only the owning generation may remove the entry; a
                    // racing reset that bumped the generation wins.
                    if let Some((_, p)) =
                        pending.remove_if(&key, |_, p| p.generation == generation)
                    {
                        on_flush(DebounceSnapshot {
                            user_key: key,
                            events: p.events,
                            first_at: p.first_at,
                            last_at: p.last_at,
                        });
                    }
                }
            }
        });
    }

    /// Number of senders currently holding an open window.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Cancel all timers and drop buffered events. The conversation log has
    /// already retained the turns at preprocessing.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.pending.clear();
    }
}
