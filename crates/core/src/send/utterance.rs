//! Utterance planning: decide whether a reply goes out as one message or
//! as a short burst of smaller ones, the way people actually type.

use crate::dice::Dice;
use crate::reply::DynamicStyle;

/// Sentence-final punctuation used both for splitting and for stripping
/// from non-final segments.
const SENTENCE_BREAKS: &[char] = &['。', '！', '？', '!', '?', '\n'];
const CLAUSE_BREAKS: &[char] = &['，', ','];
/// Parts longer than this get a second-pass clause split.
const LONG_PART_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtteranceSegment {
    pub text: String,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct UtterancePlan {
    pub segments: Vec<UtteranceSegment>,
}

impl UtterancePlan {
    fn single(text: &str) -> Self {
        Self {
            segments: vec![UtteranceSegment { text: text.to_owned(), delay_ms: 0 }],
        }
    }
}

/// Decide single vs. multi-send from length and persona knobs.
pub fn plan_utterances(
    text: &str,
    style: &DynamicStyle,
    is_at_reply: bool,
    dice: &mut dyn Dice,
) -> UtterancePlan {
    let text = text.trim();
    let len = text.chars().count();
    let verbosity = style.verbosity;
    let multi = style.multi_utterance_preference;

    let single = len <= 40
        || (len <= 80 && verbosity < 0.5)
        || (len <= 150 && (verbosity < 0.2 || multi < 0.2))
        || (is_at_reply && len <= 120 && verbosity < 0.6);
    if single {
        return UtterancePlan::single(text);
    }

    let parts = split_parts(text);
    if parts.len() < 2 {
        return UtterancePlan::single(text);
    }

    // 2–4 segments, more for long replies and chatty personas.
    let mut target = 2 + (len / 120).min(1) + usize::from(multi > 0.6);
    target = target.clamp(2, 4);
    let grouped = regroup(parts, target);

    let last = grouped.len() - 1;
    let segments = grouped
        .into_iter()
        .enumerate()
        .map(|(i, mut part)| {
            if i < last {
                // Casual feel: drop the formal sentence ending mid-burst.
                while part.ends_with(|c| SENTENCE_BREAKS.contains(&c)) {
                    part.pop();
                }
            }
            let delay_ms = if i == 0 {
                0
            } else {
                let base = 400 + dice.jitter(0, 500);
                (base as f32 * (1.0 + 0.3 * verbosity)) as u64
            };
            UtteranceSegment { text: part, delay_ms }
        })
        .filter(|s| !s.text.is_empty())
        .collect();

    UtterancePlan { segments }
}

/// Split on sentence punctuation (keeping the mark), then clause-split any
/// part still longer than [`LONG_PART_CHARS`].
fn split_parts(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c == '\n' {
            if !current.trim().is_empty() {
                sentences.push(current.trim().to_owned());
            }
            current = String::new();
            continue;
        }
        current.push(c);
        if SENTENCE_BREAKS.contains(&c) {
            sentences.push(current.trim().to_owned());
            current = String::new();
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_owned());
    }

    let mut parts = Vec::new();
    for sentence in sentences {
        if sentence.chars().count() <= LONG_PART_CHARS {
            parts.push(sentence);
            continue;
        }
        let mut clause = String::new();
        for c in sentence.chars() {
            if CLAUSE_BREAKS.contains(&c) {
                if !clause.trim().is_empty() {
                    parts.push(clause.trim().to_owned());
                }
                clause = String::new();
            } else {
                clause.push(c);
            }
        }
        if !clause.trim().is_empty() {
            parts.push(clause.trim().to_owned());
        }
    }
    parts.retain(|p| !p.is_empty());
    parts
}

/// Merge consecutive parts into at most `target` groups, balancing by
/// character count.
fn regroup(parts: Vec<String>, target: usize) -> Vec<String> {
    if parts.len() <= target {
        return parts;
    }
    let total: usize = parts.iter().map(|p| p.chars().count()).sum();
    let budget = total.div_ceil(target);

    let mut grouped: Vec<String> = Vec::with_capacity(target);
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut remaining_groups = target;
    for part in parts {
        let part_len = part.chars().count();
        let must_flush = !current.is_empty()
            && current_len + part_len > budget
            && remaining_groups > 1;
        if must_flush {
            grouped.push(current);
            current = String::new();
            current_len = 0;
            remaining_groups -= 1;
        }
        current.push_str(&part);
        current_len += part_len;
    }
    if !current.is_empty() {
        grouped.push(current);
    }
    grouped
}
