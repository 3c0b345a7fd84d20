//! Spam taxonomy over a member's recent message buffer.
//!
//! Classification only activates once the sender has produced three or
//! more messages inside the pattern window; a quiet sender is always
//! `Normal`. Sub-scores are checked in a fixed order — noise, then
//! help-seeking, then meme-play — and the first crossed threshold wins.

use super::member::RecentMessage;
use crate::lingo;
use crate::types::SpamType;

const MIN_BURST: usize = 3;
const NOISE_THRESHOLD: f32 = 0.6;
const HELP_THRESHOLD: f32 = 0.5;
const MEME_THRESHOLD: f32 = 0.5;

/// Classify a sender's recent stream (oldest first, already windowed).
pub fn classify_spam(recent: Vec<&RecentMessage>) -> SpamType {
    if recent.len() < MIN_BURST {
        return SpamType::Normal;
    }

    if noise_score(&recent) > NOISE_THRESHOLD {
        SpamType::Noise
    } else if help_score(&recent) > HELP_THRESHOLD {
        SpamType::HelpSeeking
    } else if meme_score(&recent) > MEME_THRESHOLD {
        SpamType::MemePlay
    } else {
        SpamType::Normal
    }
}

fn avg_chars(recent: &[&RecentMessage]) -> f32 {
    let total: usize = recent.iter().map(|m| m.raw.chars().count()).sum();
    total as f32 / recent.len() as f32
}

fn fraction(recent: &[&RecentMessage], pred: impl Fn(&str) -> bool) -> f32 {
    let hits = recent.iter().filter(|m| pred(&m.raw)).count();
    hits as f32 / recent.len() as f32
}

/// Contentless chatter: very short, punctuation-only or emoji-heavy bursts.
fn noise_score(recent: &[&RecentMessage]) -> f32 {
    let avg = avg_chars(recent);
    let short_bonus = if avg < 4.0 {
        0.4
    } else if avg < 8.0 {
        0.2
    } else {
        0.0
    };
    let punct = fraction(recent, lingo::is_punctuation_only) * 0.5;
    let emoji: f32 = recent
        .iter()
        .map(|m| lingo::emoji_density(&m.raw))
        .sum::<f32>()
        / recent.len() as f32
        * 0.3;
    let burst_bonus = if recent.len() >= 6 { 0.15 } else { 0.0 };
    (short_bonus + punct + emoji + burst_bonus).clamp(0.0, 1.0)
}

/// Someone actually asking for help: questions, help words, real sentences.
fn help_score(recent: &[&RecentMessage]) -> f32 {
    let questions = fraction(recent, lingo::is_question) * 0.45;
    let help_words = fraction(recent, lingo::has_help_words) * 0.5;
    let length_bonus = if avg_chars(recent) >= 10.0 { 0.1 } else { 0.0 };
    (questions + help_words + length_bonus).clamp(0.0, 1.0)
}

/// Meme-play: lexicon hits, laughter, self-repetition.
fn meme_score(recent: &[&RecentMessage]) -> f32 {
    let meme_words = fraction(recent, lingo::has_meme_words) * 0.5;
    let laughter = fraction(recent, lingo::has_laughter) * 0.2;

    let mut normalized: Vec<&str> = recent
        .iter()
        .map(|m| m.normalized.as_str())
        .filter(|n| !n.is_empty())
        .collect();
    normalized.sort();
    let total = normalized.len();
    normalized.dedup();
    let dupes = total.saturating_sub(normalized.len());
    let repetition = if total == 0 {
        0.0
    } else {
        dupes as f32 / total as f32 * 0.3
    };

    (meme_words + laughter + repetition).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msgs(texts: &[&str]) -> Vec<RecentMessage> {
        texts
            .iter()
            .map(|t| RecentMessage {
                at: Utc::now(),
                raw: (*t).to_owned(),
                normalized: lingo::normalize(t),
            })
            .collect()
    }

    fn classify(texts: &[&str]) -> SpamType {
        let owned = msgs(texts);
        classify_spam(owned.iter().collect())
    }

    #[test]
    fn quiet_sender_is_normal() {
        assert_eq!(classify(&[]), SpamType::Normal);
        assert_eq!(classify(&["求助！怎么办？"]), SpamType::Normal);
        assert_eq!(classify(&["?", "!"]), SpamType::Normal);
    }

    #[test]
    fn punctuation_burst_is_noise() {
        assert_eq!(classify(&["???", "！！！", "。。。"]), SpamType::Noise);
    }

    #[test]
    fn noise_wins_over_help_on_empty_questions() {
        // All question marks, but contentless — noise is checked first.
        assert_eq!(classify(&["?", "??", "???"]), SpamType::Noise);
    }

    #[test]
    fn repeated_questions_are_help_seeking() {
        assert_eq!(
            classify(&[
                "有人会配置webpack吗",
                "求助 这个报错怎么办",
                "真的搞不定了 请问有大佬吗",
            ]),
            SpamType::HelpSeeking
        );
    }

    #[test]
    fn meme_burst_is_meme_play() {
        assert_eq!(classify(&["哈哈哈哈", "草", "xswl"]), SpamType::MemePlay);
    }

    #[test]
    fn ordinary_chat_is_normal() {
        assert_eq!(
            classify(&[
                "今天下午去打球",
                "顺便把上次的书带给你",
                "大概三点到球场",
            ]),
            SpamType::Normal
        );
    }
}
