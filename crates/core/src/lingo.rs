//! Lexical heuristics shared by the planner, guard, spam classifier and
//! context builder. All of these are cheap substring scans — no tokenizer,
//! no model calls.

/// Chinese interrogatives that mark a question even without a question mark.
const INTERROGATIVES: &[&str] = &[
    "吗", "嘛", "怎么", "为什么", "为啥", "咋", "如何", "哪", "什么", "啥",
    "几点", "多少", "能不能", "可不可以", "是不是", "有没有",
];

/// Help-seeking cues.
const HELP_WORDS: &[&str] = &[
    "求助", "帮我", "帮忙", "请问", "怎么办", "救命", "急", "help", "跪求",
    "有人会", "谁知道", "报错", "不会弄",
];

/// Meme / banter lexicon.
const MEME_WORDS: &[&str] = &[
    "哈哈", "哈哈哈", "草", "笑死", "xswl", "666", "泪目", "绝了", "顶",
    "蹲", "awsl", "yyds", "狗头", "捧腹", "hhh", "lol", "lmao",
];

/// Laughter tokens (subset of meme lexicon, used for topic hints).
const LAUGHTER: &[&str] = &["哈哈", "hhh", "笑死", "xswl", "lol", "lmao", "233"];

/// Strong-emotion markers that bypass the reply cooldown.
const STRONG_EMOTION: &[&str] = &[
    "！！", "!!", "气死", "崩溃", "无语", "离谱", "服了", "哭了", "太惨",
    "救命", "吐了", "生气",
];

/// Topic keywords the persona cares about (mild interest bonus).
const TOPIC_WORDS: &[&str] = &[
    "游戏", "音乐", "电影", "动漫", "代码", "吃", "喝", "旅游", "猫", "狗",
];

/// True when the text reads as a question: `?` / `？` or an interrogative.
pub fn is_question(text: &str) -> bool {
    text.contains('?') || text.contains('？') || INTERROGATIVES.iter().any(|w| text.contains(w))
}

/// True for `?`/`？` marks only — no lexicon. The topic-summary hint and
/// the quote-target scorer want explicit marks; the guard and planner use
/// the wider [`is_question`].
pub fn has_question_mark(text: &str) -> bool {
    text.contains('?') || text.contains('？')
}

pub fn has_help_words(text: &str) -> bool {
    let lower = text.to_lowercase();
    HELP_WORDS.iter().any(|w| lower.contains(w))
}

pub fn has_meme_words(text: &str) -> bool {
    let lower = text.to_lowercase();
    MEME_WORDS.iter().any(|w| lower.contains(w))
}

pub fn has_laughter(text: &str) -> bool {
    let lower = text.to_lowercase();
    LAUGHTER.iter().any(|w| lower.contains(w))
}

pub fn has_strong_emotion(text: &str) -> bool {
    STRONG_EMOTION.iter().any(|w| text.contains(w))
}

pub fn has_topic_words(text: &str) -> bool {
    TOPIC_WORDS.iter().any(|w| text.contains(w))
}

/// True when the trimmed text consists of punctuation/symbols only.
pub fn is_punctuation_only(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_punctuation() || is_cjk_punctuation(c))
}

fn is_cjk_punctuation(c: char) -> bool {
    matches!(c,
        '\u{3000}'..='\u{303F}' |   // CJK symbols and punctuation
        '\u{FF00}'..='\u{FF0F}' |   // full-width forms (！ ？ ， etc.)
        '\u{FF1A}'..='\u{FF20}' |
        '\u{FF3B}'..='\u{FF40}' |
        '\u{FF5B}'..='\u{FF65}')
}

/// Fraction of chars that are emoji-ish (emoticons, symbols, pictographs).
pub fn emoji_density(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let emoji = text.chars().filter(|&c| is_emoji(c)).count();
    emoji as f32 / total as f32
}

fn is_emoji(c: char) -> bool {
    matches!(c,
        '\u{1F300}'..='\u{1FAFF}' |
        '\u{2600}'..='\u{27BF}' |
        '\u{FE0F}' |
        '\u{1F000}'..='\u{1F0FF}')
}

/// Normalize text for repetition / meme-equality comparison: lowercase,
/// whitespace stripped, trailing punctuation stripped.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .filter(|c| !c.is_ascii_punctuation() && !is_cjk_punctuation(*c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_detection() {
        assert!(is_question("在吗"));
        assert!(is_question("what?"));
        assert!(is_question("这是什么"));
        assert!(is_question("为什么会这样"));
        assert!(!is_question("好的"));
    }

    #[test]
    fn question_mark_is_narrower() {
        assert!(has_question_mark("在？"));
        assert!(!has_question_mark("在吗")); // lexicon hit, no mark
    }

    #[test]
    fn help_and_meme_words() {
        assert!(has_help_words("求助！这个报错怎么办"));
        assert!(has_help_words("HELP me please"));
        assert!(has_meme_words("笑死我了"));
        assert!(has_meme_words("XSWL"));
        assert!(!has_meme_words("今天天气不错"));
    }

    #[test]
    fn strong_emotion_markers() {
        assert!(has_strong_emotion("气死我了！！"));
        assert!(has_strong_emotion("服了"));
        assert!(!has_strong_emotion("好的"));
    }

    #[test]
    fn punctuation_only() {
        assert!(is_punctuation_only("???"));
        assert!(is_punctuation_only("！！！"));
        assert!(is_punctuation_only("。。。"));
        assert!(!is_punctuation_only("好?"));
        assert!(!is_punctuation_only(""));
    }

    #[test]
    fn emoji_density_counts() {
        assert_eq!(emoji_density(""), 0.0);
        assert!(emoji_density("😂😂😂") > 0.9);
        assert!(emoji_density("今天真好") < 0.01);
    }

    #[test]
    fn normalize_strips_noise() {
        assert_eq!(normalize("哈哈 哈！"), normalize("哈哈哈"));
        assert_eq!(normalize("Hello, World"), "helloworld");
        assert_ne!(normalize("哈哈"), normalize("呵呵"));
    }
}
