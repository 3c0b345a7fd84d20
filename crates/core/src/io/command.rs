use std::future::Future;
use std::pin::Pin;

use crate::types::EnrichedEvent;

/// Slash-command handling, injected from outside the engine. The
/// orchestrator only recognizes the `/` and `！` prefixes and routes the
/// event here on the session queue.
pub trait CommandDispatcher: Send + Sync {
    fn handle(
        &self,
        event: &EnrichedEvent,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Default dispatcher: log and drop.
#[derive(Debug, Default)]
pub struct NullDispatcher;

impl CommandDispatcher for NullDispatcher {
    fn handle(
        &self,
        event: &EnrichedEvent,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let session = event.event.session_key();
        let text = event.event.raw_text.clone();
        Box::pin(async move {
            tracing::debug!(session = %session, text = %text, "command dropped (no dispatcher)");
        })
    }
}
