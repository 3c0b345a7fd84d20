use crate::types::ReplyMode;

/// Snapshot of engine state, broadcast over a watch channel after each
/// processed event. Read-only; for diagnosis, not control.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStatus {
    pub sessions: usize,
    pub pending_debounces: usize,
    pub energy: f32,
    pub last_mode: Option<ReplyMode>,
    pub replies_sent: u64,
}
