//! Reply planner: layered probability model over text interest, social
//! attention, persona talkativeness and energy, dampened by group heat and
//! the spam taxonomy, resolved by a dice roll.
//!
//! `plan` is a pure function of its inputs and the RNG state; every factor
//! that feeds it is read beforehand into [`PlanSignals`].

use crate::config::BanterCfg;
use crate::dice::Dice;
use crate::lingo;
use crate::types::{PlanMeta, PlanResult, PlanSignals, ReplyMode, SpamType};

/// Fixed persona chattiness factor.
const TALKATIVENESS: f32 = 0.35;
/// Chance that the bot is "lurking" and barely registers a message.
const LURKING_PROBABILITY: f32 = 0.10;
const LURKING_INTEREST: f32 = 0.05;

/// Factor weights: interest, social, persona, energy.
const W_INTEREST: f32 = 0.20;
const W_SOCIAL: f32 = 0.25;
const W_PERSONA: f32 = 0.10;
const W_ENERGY: f32 = 0.25;

/// Decide whether / how / after what delay to reply to one event.
pub fn plan(
    text: &str,
    mentions_bot: bool,
    signals: &PlanSignals,
    cfg: &BanterCfg,
    dice: &mut dyn Dice,
) -> PlanResult {
    let trimmed = text.trim_start();
    if trimmed.starts_with('/') || trimmed.starts_with('！') {
        let mut p = PlanResult::reply(ReplyMode::Command, 0);
        p.meta.reason = "command".into();
        return p;
    }

    if mentions_bot {
        let mut p = PlanResult::reply(ReplyMode::Smalltalk, 600);
        p.meta.reason = "mention".into();
        return p;
    }

    // Cooldown gate. Questions and strong emotion are allowed through.
    let is_question = lingo::is_question(text);
    let is_emotional = lingo::has_strong_emotion(text);
    if let Some(since) = signals.since_last_bot_ms
        && !is_question
        && !is_emotional
    {
        if since < cfg.cooldown_hard_ms {
            return PlanResult::ignore("cooldown-hard");
        }
        if since < cfg.cooldown_soft_ms && dice.roll() < cfg.cooldown_soft_skip_probability {
            return PlanResult::ignore("cooldown-soft");
        }
    }

    let base_interest = base_interest(text, is_question, dice);
    let social_attention =
        (0.5 * signals.intimacy + 0.5 * if mentions_bot { 1.0 } else { 0.0 }).min(1.0) * 0.7;
    let energy_factor = signals.energy;

    let mut probability = W_INTEREST * base_interest
        + W_SOCIAL * social_attention
        + W_PERSONA * TALKATIVENESS
        + W_ENERGY * energy_factor;

    // A hot group talks over the bot.
    if signals.group_activity > 0.7 {
        probability *= 0.3;
    } else if signals.group_activity > 0.5 {
        probability *= 0.5;
    }

    match signals.spam {
        SpamType::HelpSeeking => {
            probability *= 1.2;
            if signals.urgency > 0.65 {
                probability = probability.max(0.5);
            }
        }
        SpamType::MemePlay => probability *= 0.6,
        SpamType::Noise => probability *= 0.2,
        SpamType::Normal => {}
    }

    if signals.repetition > 0.5 && signals.spam != SpamType::HelpSeeking {
        probability *= 0.5;
    }
    if signals.meme_score > 0.4 {
        probability += 0.05;
    }
    probability = probability.clamp(0.0, 1.0);

    let meta = PlanMeta {
        probability,
        base_interest,
        social_attention,
        energy: energy_factor,
        group_activity: signals.group_activity,
        spam: signals.spam,
        reason: String::new(),
    };

    if dice.roll() >= probability {
        let mut p = PlanResult::ignore("dice-skip");
        p.meta = PlanMeta { reason: "dice-skip".into(), ..meta };
        return p;
    }

    let mode = pick_mode(signals, dice);
    let delay_ms = 500 + dice.jitter(0, 300);
    PlanResult {
        should_reply: true,
        mode,
        delay_ms,
        meta: PlanMeta { reason: "reply".into(), ..meta },
    }
}

/// Text interest in [0,1], pre-scaled to a 0.6 ceiling. A small lurking
/// chance makes the bot occasionally blind to an otherwise interesting
/// message.
fn base_interest(text: &str, is_question: bool, dice: &mut dyn Dice) -> f32 {
    let raw = if dice.roll() < LURKING_PROBABILITY {
        LURKING_INTEREST
    } else {
        let mut score = 0.0;
        if is_question {
            score += 0.25;
        }
        if lingo::has_help_words(text) {
            score += 0.25;
        }
        score += (text.chars().count() as f32 / 100.0).min(0.2);
        if lingo::has_topic_words(text) {
            score += 0.1;
        }
        score
    };
    raw.min(1.0) * 0.6
}

/// Mode selection by intimacy bands, with spam overrides.
fn pick_mode(signals: &PlanSignals, dice: &mut dyn Dice) -> ReplyMode {
    if signals.spam == SpamType::HelpSeeking && signals.urgency > 0.7 {
        return ReplyMode::DirectAnswer;
    }

    if signals.intimacy < 0.3 {
        let r = dice.roll();
        return if r < 0.4 {
            ReplyMode::Fragment
        } else if r < 0.7 {
            ReplyMode::PassiveAcknowledge
        } else {
            ReplyMode::Casual
        };
    }

    if signals.intimacy > 0.7 && dice.roll() < 0.25 {
        return ReplyMode::PlayfulTease;
    }

    let r = dice.roll();
    if r < 0.7 {
        ReplyMode::Casual
    } else if r < 0.9 {
        ReplyMode::Fragment
    } else {
        ReplyMode::Smalltalk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::{FixedDice, SeededDice};

    fn cfg() -> BanterCfg {
        BanterCfg::default()
    }

    fn signals() -> PlanSignals {
        PlanSignals {
            since_last_bot_ms: None,
            intimacy: 0.5,
            spam: SpamType::Normal,
            urgency: 0.0,
            repetition: 0.0,
            meme_score: 0.0,
            group_activity: 0.0,
            energy: 1.0,
        }
    }

    #[test]
    fn command_is_immediate() {
        let mut dice = SeededDice::new(1);
        let p = plan("/help", false, &signals(), &cfg(), &mut dice);
        assert!(p.should_reply);
        assert_eq!(p.mode, ReplyMode::Command);
        assert_eq!(p.delay_ms, 0);

        let p = plan("！状态", false, &signals(), &cfg(), &mut dice);
        assert_eq!(p.mode, ReplyMode::Command);
    }

    #[test]
    fn mention_short_circuits_cooldown() {
        let mut dice = SeededDice::new(1);
        let mut s = signals();
        s.since_last_bot_ms = Some(3000);
        let p = plan("ok", true, &s, &cfg(), &mut dice);
        assert!(p.should_reply);
        assert_eq!(p.mode, ReplyMode::Smalltalk);
        assert_eq!(p.delay_ms, 600);
    }

    #[test]
    fn hard_cooldown_ignores_plain_text() {
        let mut dice = SeededDice::new(1);
        let mut s = signals();
        s.since_last_bot_ms = Some(3000);
        let p = plan("ok", false, &s, &cfg(), &mut dice);
        assert!(!p.should_reply);
        assert_eq!(p.mode, ReplyMode::Ignore);
        assert_eq!(p.meta.reason, "cooldown-hard");
    }

    #[test]
    fn question_bypasses_hard_cooldown() {
        let mut s = signals();
        s.since_last_bot_ms = Some(3000);
        // Pin the dice low so the reply roll always succeeds.
        let mut dice = FixedDice::always(0.0);
        let p = plan("为什么会这样？", false, &s, &cfg(), &mut dice);
        assert!(p.should_reply);
        assert_eq!(p.meta.reason, "reply");
    }

    #[test]
    fn strong_emotion_bypasses_hard_cooldown() {
        let mut s = signals();
        s.since_last_bot_ms = Some(3000);
        let mut dice = FixedDice::always(0.0);
        let p = plan("气死我了！！", false, &s, &cfg(), &mut dice);
        assert!(p.should_reply);
    }

    #[test]
    fn soft_cooldown_skips_probabilistically() {
        let mut s = signals();
        s.since_last_bot_ms = Some(8000);
        // Roll 0.5 < 0.65 → soft skip.
        let mut dice = FixedDice::always(0.5);
        let p = plan("ok", false, &s, &cfg(), &mut dice);
        assert!(!p.should_reply);
        assert_eq!(p.meta.reason, "cooldown-soft");

        // Roll 0.9 ≥ 0.65 → survives the soft gate (then dice-skips on the
        // reply roll because probability < 0.9).
        let mut dice = FixedDice::always(0.9);
        let p = plan("ok", false, &s, &cfg(), &mut dice);
        assert_eq!(p.meta.reason, "dice-skip");
    }

    #[test]
    fn probability_is_dampened_by_group_heat() {
        let mut dice = FixedDice::always(0.99);
        let mut s = signals();
        let quiet = plan("今天玩什么游戏", false, &s, &cfg(), &mut dice);

        s.group_activity = 0.8;
        let busy = plan("今天玩什么游戏", false, &s, &cfg(), &mut dice);
        assert!(busy.meta.probability < quiet.meta.probability);
        assert!((busy.meta.probability - quiet.meta.probability * 0.3).abs() < 0.001);
    }

    #[test]
    fn noise_is_heavily_dampened() {
        let mut dice = FixedDice::always(0.99);
        let mut s = signals();
        let normal = plan("哦哦这样啊", false, &s, &cfg(), &mut dice);

        s.spam = SpamType::Noise;
        let noisy = plan("哦哦这样啊", false, &s, &cfg(), &mut dice);
        assert!((noisy.meta.probability - normal.meta.probability * 0.2).abs() < 0.001);
    }

    #[test]
    fn urgent_help_gets_probability_floor() {
        let mut dice = FixedDice::always(0.99);
        let mut s = signals();
        s.spam = SpamType::HelpSeeking;
        s.urgency = 0.8;
        s.energy = 0.0; // would otherwise leave a tiny probability
        let p = plan("求助", false, &s, &cfg(), &mut dice);
        assert!(p.meta.probability >= 0.5);
    }

    #[test]
    fn urgent_help_overrides_mode() {
        let mut s = signals();
        s.spam = SpamType::HelpSeeking;
        s.urgency = 0.8;
        let mut dice = FixedDice::always(0.0);
        let p = plan("求助 怎么办", false, &s, &cfg(), &mut dice);
        assert!(p.should_reply);
        assert_eq!(p.mode, ReplyMode::DirectAnswer);
    }

    #[test]
    fn low_intimacy_mixes_low_effort_modes() {
        let mut s = signals();
        s.intimacy = 0.1;
        let mut seen = std::collections::HashSet::new();
        for seed in 0..64 {
            let mut dice = SeededDice::new(seed);
            let p = plan("随便聊聊今天的事", false, &s, &cfg(), &mut dice);
            if p.should_reply {
                seen.insert(p.mode);
            }
        }
        for mode in seen {
            assert!(matches!(
                mode,
                ReplyMode::Fragment | ReplyMode::PassiveAcknowledge | ReplyMode::Casual
            ));
        }
    }

    #[test]
    fn delay_stays_in_band() {
        let mut s = signals();
        s.energy = 1.0;
        for seed in 0..32 {
            let mut dice = SeededDice::new(seed);
            let p = plan("这个游戏好玩吗", false, &s, &cfg(), &mut dice);
            if p.should_reply {
                assert!((500..800).contains(&p.delay_ms));
            }
        }
    }

    #[test]
    fn deterministic_given_same_seed() {
        let s = signals();
        let mut a = SeededDice::new(99);
        let mut b = SeededDice::new(99);
        let pa = plan("今天吃什么", false, &s, &cfg(), &mut a);
        let pb = plan("今天吃什么", false, &s, &cfg(), &mut b);
        assert_eq!(pa.should_reply, pb.should_reply);
        assert_eq!(pa.mode, pb.mode);
        assert_eq!(pa.delay_ms, pb.delay_ms);
    }
}
