//! Dynamic style parameters: a fixed per-mode table blended with the
//! sender's intimacy and the bot's current energy.

use crate::config::PersonaCfg;
use crate::types::ReplyMode;

/// Style knobs handed to the prompt builder and the utterance planner.
#[derive(Debug, Clone)]
pub struct DynamicStyle {
    pub tone: Option<String>,
    pub slang: Option<f32>,
    pub intimacy: Option<f32>,
    /// How much the bot says, [0,1].
    pub verbosity: f32,
    /// How strongly the bot prefers splitting into multiple sends, [0,1].
    pub multi_utterance_preference: f32,
}

/// Per-mode baseline: (verbosity, multi-utterance preference, tone).
fn mode_table(mode: ReplyMode) -> (f32, f32, &'static str) {
    match mode {
        ReplyMode::Smalltalk => (0.50, 0.50, "轻松寒暄"),
        ReplyMode::Casual => (0.45, 0.40, "随口接话"),
        ReplyMode::Fragment => (0.20, 0.70, "碎片短语"),
        ReplyMode::DirectAnswer => (0.70, 0.30, "认真回答"),
        ReplyMode::PassiveAcknowledge => (0.15, 0.20, "敷衍附和"),
        ReplyMode::PlayfulTease => (0.40, 0.60, "调侃逗趣"),
        ReplyMode::EmpathySupport => (0.60, 0.40, "安慰共情"),
        ReplyMode::Deflect => (0.30, 0.30, "打岔带过"),
        ReplyMode::Command | ReplyMode::Ignore => (0.40, 0.30, "平铺直叙"),
    }
}

/// Blend the mode baseline: tired bots say less, close friends get more
/// fragmented multi-sends.
pub fn derive_style(
    mode: ReplyMode,
    intimacy: f32,
    energy: f32,
    persona: &PersonaCfg,
) -> DynamicStyle {
    let (base_verbosity, base_multi, tone) = mode_table(mode);
    let verbosity = (base_verbosity * (0.7 + 0.6 * energy)).clamp(0.0, 1.0);
    let multi = (base_multi * (0.8 + 0.4 * intimacy)).clamp(0.0, 1.0);
    DynamicStyle {
        tone: Some(tone.to_owned()),
        slang: Some(persona.slang),
        intimacy: Some(intimacy),
        verbosity,
        multi_utterance_preference: multi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona() -> PersonaCfg {
        PersonaCfg::default()
    }

    #[test]
    fn direct_answer_is_most_verbose() {
        let direct = derive_style(ReplyMode::DirectAnswer, 0.5, 1.0, &persona());
        let passive = derive_style(ReplyMode::PassiveAcknowledge, 0.5, 1.0, &persona());
        assert!(direct.verbosity > passive.verbosity);
    }

    #[test]
    fn low_energy_shortens_replies() {
        let fresh = derive_style(ReplyMode::Casual, 0.5, 1.0, &persona());
        let tired = derive_style(ReplyMode::Casual, 0.5, 0.1, &persona());
        assert!(tired.verbosity < fresh.verbosity);
    }

    #[test]
    fn intimacy_raises_multi_send_preference() {
        let stranger = derive_style(ReplyMode::Fragment, 0.1, 1.0, &persona());
        let friend = derive_style(ReplyMode::Fragment, 0.9, 1.0, &persona());
        assert!(friend.multi_utterance_preference > stranger.multi_utterance_preference);
    }

    #[test]
    fn knobs_stay_in_unit_interval() {
        for mode in [
            ReplyMode::Smalltalk,
            ReplyMode::Casual,
            ReplyMode::Fragment,
            ReplyMode::DirectAnswer,
            ReplyMode::PassiveAcknowledge,
            ReplyMode::PlayfulTease,
            ReplyMode::EmpathySupport,
            ReplyMode::Deflect,
        ] {
            let s = derive_style(mode, 1.0, 1.0, &persona());
            assert!((0.0..=1.0).contains(&s.verbosity));
            assert!((0.0..=1.0).contains(&s.multi_utterance_preference));
            assert!(s.tone.is_some());
        }
    }
}
