use std::collections::VecDeque;

use dashmap::DashMap;

use crate::types::ChatTurn;

/// In-memory conversation log: per-channel bounded ring of turns.
/// Append-only, FIFO eviction, reads return snapshot slices.
#[derive(Debug)]
pub struct ConversationStore {
    max_turns: usize,
    turns: DashMap<String, VecDeque<ChatTurn>>,
}

impl ConversationStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            turns: DashMap::new(),
        }
    }

    /// Append a turn under `key`, evicting the oldest once the ring is full.
    pub fn append_turn(&self, key: &str, turn: ChatTurn) {
        let mut ring = self
            .turns
            .entry(key.to_owned())
            .or_insert_with(|| VecDeque::with_capacity(self.max_turns));
        if ring.len() >= self.max_turns {
            ring.pop_front();
        }
        ring.push_back(turn);
    }

    /// Snapshot of the newest `limit` turns, oldest first.
    pub fn recent_turns(&self, key: &str, limit: usize) -> Vec<ChatTurn> {
        match self.turns.get(key) {
            Some(ring) => {
                let skip = ring.len().saturating_sub(limit);
                ring.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    pub fn len(&self, key: &str) -> usize {
        self.turns.get(key).map(|r| r.len()).unwrap_or(0)
    }

    pub fn clear(&self, key: &str) {
        self.turns.remove(key);
    }
}
