use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Cancellation handle held while the send pipeline simulates typing.
/// The single cancellation primitive of the engine: fresh incoming traffic
/// increments the counter and trips the token at the interrupt threshold;
/// the sender polls at every sleep boundary.
#[derive(Debug, Clone)]
pub struct TypingToken {
    id: Uuid,
    cancel: CancellationToken,
    incoming: Arc<AtomicU32>,
    started_at: DateTime<Utc>,
}

impl TypingToken {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            incoming: Arc::new(AtomicU32::new(0)),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves when the token is cancelled; for `select!` against sleeps.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Record one user message that arrived while typing. Trips the token
    /// once the count reaches `threshold`. Returns (new count, tripped now).
    pub fn note_incoming(&self, threshold: u32) -> (u32, bool) {
        let n = self.incoming.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= threshold && !self.cancel.is_cancelled() {
            self.cancel.cancel();
            return (n, true);
        }
        (n, false)
    }

    pub fn incoming(&self) -> u32 {
        self.incoming.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_live() {
        let t = TypingToken::new();
        assert!(!t.is_cancelled());
        assert_eq!(t.incoming(), 0);
    }

    #[test]
    fn trips_at_threshold() {
        let t = TypingToken::new();
        assert_eq!(t.note_incoming(3), (1, false));
        assert_eq!(t.note_incoming(3), (2, false));
        let (n, tripped) = t.note_incoming(3);
        assert_eq!(n, 3);
        assert!(tripped);
        assert!(t.is_cancelled());

        // Further traffic keeps counting but never re-trips.
        let (n, tripped) = t.note_incoming(3);
        assert_eq!(n, 4);
        assert!(!tripped);
    }

    #[test]
    fn clones_share_the_flag() {
        let t = TypingToken::new();
        let view = t.clone();
        t.cancel();
        assert!(view.is_cancelled());
        assert_eq!(t.id(), view.id());
    }

    #[tokio::test]
    async fn cancelled_future_resolves() {
        let t = TypingToken::new();
        let waiter = t.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        t.cancel();
        handle.await.unwrap();
    }
}
