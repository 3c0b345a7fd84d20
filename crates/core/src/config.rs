use serde::{Deserialize, Serialize};

/// Who the bot is, for prompt assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaCfg {
    pub name: String,
    pub description: String,
    pub tone: String,
    /// Slang level in [0,1], rendered into the STYLE block.
    pub slang: f32,
    /// Extra persona constraints appended to the system prompt.
    pub constraints: Vec<String>,
}

impl Default for PersonaCfg {
    fn default() -> Self {
        Self {
            name: "小梆".to_owned(),
            description: "一个爱凑热闹的群友".to_owned(),
            tone: "随性、短句、偶尔玩梗".to_owned(),
            slang: 0.4,
            constraints: Vec::new(),
        }
    }
}

/// All orchestration parameters. Defaults match the reference behavior;
/// `from_env` overlays `BANTER_*` variables for deployment tweaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanterCfg {
    // debouncing
    pub debounce_delay_ms: u64,

    // reply cooldowns
    pub cooldown_hard_ms: i64,
    pub cooldown_soft_ms: i64,
    pub cooldown_soft_skip_probability: f32,

    // simulated typing latency
    pub typing_min_ms: u64,
    pub typing_max_ms: u64,
    pub typing_base_ms: u64,
    pub typing_per_char_ms: u64,
    pub typing_jitter_ms: u64,

    // inter-segment pacing
    pub segment_base_ms: u64,
    pub segment_per_char_ms: u64,
    pub segment_jitter_ms: u64,
    pub segment_cap_ms: u64,

    // conversation log
    pub ring_max_turns: usize,

    // group activity window
    pub activity_window_ms: i64,
    /// Messages per minute considered "very active".
    pub activity_normalizer: u32,

    // energy model
    pub energy_recovery_per_minute: f32,
    pub energy_cost_per_reply: f32,

    // typing interruption & quoting
    pub interrupt_threshold: u32,
    pub quote_gap_threshold: u64,

    // stale backfill
    pub stale_max_event_lag_ms: i64,

    pub persona: PersonaCfg,
}

impl Default for BanterCfg {
    fn default() -> Self {
        Self {
            debounce_delay_ms: 5000,
            cooldown_hard_ms: 5000,
            cooldown_soft_ms: 12000,
            cooldown_soft_skip_probability: 0.65,
            typing_min_ms: 2800,
            typing_max_ms: 8000,
            typing_base_ms: 1000,
            typing_per_char_ms: 60,
            typing_jitter_ms: 1500,
            segment_base_ms: 500,
            segment_per_char_ms: 40,
            segment_jitter_ms: 700,
            segment_cap_ms: 3000,
            ring_max_turns: 50,
            activity_window_ms: 300_000,
            activity_normalizer: 10,
            energy_recovery_per_minute: 0.05,
            energy_cost_per_reply: 0.10,
            interrupt_threshold: 3,
            quote_gap_threshold: 3,
            stale_max_event_lag_ms: 30_000,
            persona: PersonaCfg::default(),
        }
    }
}

impl BanterCfg {
    /// Defaults overlaid with `BANTER_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            debounce_delay_ms: env_or("BANTER_DEBOUNCE_DELAY_MS", d.debounce_delay_ms),
            cooldown_hard_ms: env_or("BANTER_COOLDOWN_HARD_MS", d.cooldown_hard_ms),
            cooldown_soft_ms: env_or("BANTER_COOLDOWN_SOFT_MS", d.cooldown_soft_ms),
            cooldown_soft_skip_probability: env_or(
                "BANTER_COOLDOWN_SOFT_SKIP_PROBABILITY",
                d.cooldown_soft_skip_probability,
            ),
            typing_min_ms: env_or("BANTER_TYPING_MIN_MS", d.typing_min_ms),
            typing_max_ms: env_or("BANTER_TYPING_MAX_MS", d.typing_max_ms),
            typing_base_ms: env_or("BANTER_TYPING_BASE_MS", d.typing_base_ms),
            typing_per_char_ms: env_or("BANTER_TYPING_PER_CHAR_MS", d.typing_per_char_ms),
            typing_jitter_ms: env_or("BANTER_TYPING_JITTER_MS", d.typing_jitter_ms),
            segment_base_ms: env_or("BANTER_SEGMENT_BASE_MS", d.segment_base_ms),
            segment_per_char_ms: env_or("BANTER_SEGMENT_PER_CHAR_MS", d.segment_per_char_ms),
            segment_jitter_ms: env_or("BANTER_SEGMENT_JITTER_MS", d.segment_jitter_ms),
            segment_cap_ms: env_or("BANTER_SEGMENT_CAP_MS", d.segment_cap_ms),
            ring_max_turns: env_or("BANTER_RING_MAX_TURNS", d.ring_max_turns),
            activity_window_ms: env_or("BANTER_ACTIVITY_WINDOW_MS", d.activity_window_ms),
            activity_normalizer: env_or("BANTER_ACTIVITY_NORMALIZER", d.activity_normalizer),
            energy_recovery_per_minute: env_or(
                "BANTER_ENERGY_RECOVERY_PER_MINUTE",
                d.energy_recovery_per_minute,
            ),
            energy_cost_per_reply: env_or("BANTER_ENERGY_COST_PER_REPLY", d.energy_cost_per_reply),
            interrupt_threshold: env_or("BANTER_INTERRUPT_THRESHOLD", d.interrupt_threshold),
            quote_gap_threshold: env_or("BANTER_QUOTE_GAP_THRESHOLD", d.quote_gap_threshold),
            stale_max_event_lag_ms: env_or("BANTER_STALE_MAX_EVENT_LAG_MS", d.stale_max_event_lag_ms),
            persona: PersonaCfg {
                name: env_or("BANTER_PERSONA_NAME", d.persona.name),
                description: env_or("BANTER_PERSONA_DESCRIPTION", d.persona.description),
                tone: env_or("BANTER_PERSONA_TONE", d.persona.tone),
                slang: env_or("BANTER_PERSONA_SLANG", d.persona.slang),
                constraints: d.persona.constraints,
            },
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = BanterCfg::default();
        assert_eq!(cfg.debounce_delay_ms, 5000);
        assert_eq!(cfg.cooldown_hard_ms, 5000);
        assert_eq!(cfg.cooldown_soft_ms, 12000);
        assert_eq!(cfg.typing_min_ms, 2800);
        assert_eq!(cfg.typing_max_ms, 8000);
        assert_eq!(cfg.ring_max_turns, 50);
        assert_eq!(cfg.interrupt_threshold, 3);
        assert_eq!(cfg.quote_gap_threshold, 3);
        assert!((cfg.energy_cost_per_reply - 0.10).abs() < f32::EPSILON);
    }

    #[test]
    fn env_or_parses_and_falls_back() {
        // SAFETY: test-local env mutation, no concurrent readers of this key.
        unsafe { std::env::set_var("BANTER_TEST_KEY_MS", "1234") };
        assert_eq!(env_or("BANTER_TEST_KEY_MS", 5u64), 1234);
        unsafe { std::env::set_var("BANTER_TEST_KEY_MS", "not-a-number") };
        assert_eq!(env_or("BANTER_TEST_KEY_MS", 5u64), 5);
        assert_eq!(env_or("BANTER_TEST_KEY_MISSING", 7u64), 7);
        unsafe { std::env::remove_var("BANTER_TEST_KEY_MS") };
    }
}
