use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform randomness source behind every probabilistic decision (planner
/// dice rolls, typing jitter, segment pacing). Injected so behavior is
/// reproducible in tests.
pub trait Dice: Send {
    /// Uniform f32 in [0, 1).
    fn roll(&mut self) -> f32;

    /// Uniform u64 in [lo, hi). Returns `lo` when the range is empty.
    fn jitter(&mut self, lo: u64, hi: u64) -> u64;
}

/// Production dice backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDice;

impl Dice for ThreadDice {
    fn roll(&mut self) -> f32 {
        rand::thread_rng().r#gen::<f32>()
    }

    fn jitter(&mut self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            lo
        } else {
            rand::thread_rng().gen_range(lo..hi)
        }
    }
}

/// Seeded dice for deterministic tests.
#[derive(Debug, Clone)]
pub struct SeededDice(StdRng);

impl SeededDice {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Dice for SeededDice {
    fn roll(&mut self) -> f32 {
        self.0.r#gen::<f32>()
    }

    fn jitter(&mut self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            lo
        } else {
            self.0.gen_range(lo..hi)
        }
    }
}

/// Dice that always return fixed values — for pinning one branch in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedDice {
    pub roll: f32,
}

impl FixedDice {
    pub fn always(roll: f32) -> Self {
        Self { roll }
    }
}

impl Dice for FixedDice {
    fn roll(&mut self) -> f32 {
        self.roll
    }

    fn jitter(&mut self, lo: u64, _hi: u64) -> u64 {
        lo
    }
}
