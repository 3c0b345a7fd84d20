//! Prompt assembly: a persona system message plus one structured user
//! message built from INSTRUCTION / STYLE / SUMMARY / MEMORY / HISTORICAL /
//! NEW_WINDOW / TARGET blocks. Empty blocks are omitted.

use banter_llm::ChatMessage;

use super::context::ReplyContext;
use super::style::DynamicStyle;
use crate::config::PersonaCfg;
use crate::types::ChatTurn;

const INSTRUCTION: &str = "\
[INSTRUCTION]\n\
1. 只回应 TARGET 中的内容，HISTORICAL 和 NEW_WINDOW 仅作背景。\n\
2. 按 STYLE 给出的口吻说话。\n\
3. 想分多条发送时用 <brk> 分隔，最多 3 段。\n\
4. 只输出要发送的内容本身，不要换行，不要任何解释。";

/// Build the `[system, user]` message pair for one reply.
pub fn build_messages(
    persona: &PersonaCfg,
    style: &DynamicStyle,
    ctx: &ReplyContext,
    memory: Option<&str>,
) -> Vec<ChatMessage> {
    let mut system = format!(
        "你是 {}, {}\n人设风格：{}\n语言约束：禁止AI腔、讲大道理、格式化、分点、括号动作",
        persona.name, persona.description, persona.tone
    );
    for constraint in &persona.constraints {
        system.push('\n');
        system.push_str(constraint);
    }

    let mut sections: Vec<String> = vec![INSTRUCTION.to_owned()];

    if let Some(block) = style_block(style) {
        sections.push(block);
    }
    if let Some(topic) = &ctx.topic_summary {
        sections.push(format!("[SUMMARY] {topic}"));
    }
    if let Some(memory) = memory.filter(|m| !m.trim().is_empty()) {
        sections.push(format!("[MEMORY] {memory}"));
    }

    let last_bot = ctx.recent_turns.iter().rposition(|t| t.is_bot());
    let (historical, new_window): (&[ChatTurn], &[ChatTurn]) = match last_bot {
        Some(idx) => (&ctx.recent_turns[..=idx], &ctx.recent_turns[idx + 1..]),
        None => (&[], &ctx.recent_turns[..]),
    };

    // The context builder already holds the target run out of
    // recent_turns; everything here is pure background.
    let new_window_lines: Vec<String> = new_window.iter().map(render_turn).collect();
    let historical_lines: Vec<String> = historical.iter().map(render_turn).collect();

    if !historical_lines.is_empty() {
        sections.push(format!("[HISTORICAL]\n{}", historical_lines.join("\n")));
    }
    if !new_window_lines.is_empty() {
        sections.push(format!("[NEW_WINDOW]\n{}", new_window_lines.join("\n")));
    }
    if let Some(target) = &ctx.target_turn {
        sections.push(format!("[TARGET]\n{}", render_turn(target)));
    }

    vec![
        ChatMessage::system(system),
        ChatMessage::user(sections.join("\n\n")),
    ]
}

/// `[STYLE] tone=…; slang=N.NN; intimacy=N.NN` — only set fields appear.
fn style_block(style: &DynamicStyle) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(tone) = &style.tone {
        parts.push(format!("tone={tone}"));
    }
    if let Some(slang) = style.slang {
        parts.push(format!("slang={slang:.2}"));
    }
    if let Some(intimacy) = style.intimacy {
        parts.push(format!("intimacy={intimacy:.2}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("[STYLE] {}", parts.join("; ")))
    }
}

/// `{name}: {text}` with the bot rendered as 你, stored newlines escaped,
/// and an explicit `@你 ` marker for turns that mentioned the bot.
fn render_turn(turn: &ChatTurn) -> String {
    let name = if turn.is_bot() {
        "你"
    } else {
        turn.user_name.as_deref().unwrap_or(&turn.user_id)
    };
    let mut text = turn.content.replace('\n', "\\n");
    if turn.mentions_bot && !text.contains("@你") {
        text = format!("@你 {text}");
    }
    format!("{name}: {text}")
}

/// Flattened text of an assembled prompt, for the debug surface.
pub fn flatten_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("<{:?}>\n{}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
