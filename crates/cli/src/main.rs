//! Group-chat simulator REPL: type as different users into a fake group
//! and watch the engine decide when and how to speak.
//!
//! `/as <name>` switches the speaking user, a leading `@bot ` marks a
//! mention, `/status` dumps the engine snapshot, `/quit` exits. Anything
//! starting with `/` or `！` otherwise goes to the command dispatcher.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use banter_core::config::BanterCfg;
use banter_core::error::EngineError;
use banter_core::io::{ChatAdapter, ChatClient, CommandDispatcher, ProviderChat};
use banter_core::orchestrator::Orchestrator;
use banter_core::types::{ChatEvent, EnrichedEvent};
use chrono::Utc;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const PLATFORM: &str = "repl";
const GROUP: &str = "lobby";
const MENTION_PREFIX: &str = "@bot";

/// Prints engine sends to the terminal the way a group window would show
/// them.
struct ConsoleAdapter {
    bot_name: String,
}

impl ChatAdapter for ConsoleAdapter {
    fn send_text(
        &self,
        group_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + '_>> {
        let line = match reply_to {
            Some(id) => format!("[{}@{group_id}] (回复 {id}) {text}", self.bot_name),
            None => format!("[{}@{group_id}] {text}", self.bot_name),
        };
        Box::pin(async move {
            println!("{line}");
            Ok(())
        })
    }
}

/// Minimal command handler for the simulator.
struct SimDispatcher;

impl CommandDispatcher for SimDispatcher {
    fn handle(&self, event: &EnrichedEvent) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let text = event.event.raw_text.clone();
        Box::pin(async move {
            println!("(command) {text} — simulator only knows /as, /status, /quit");
        })
    }
}

enum InputEvent {
    Line(String),
    Interrupted,
    Eof,
    Error(String),
}

fn spawn_input_thread(line_tx: mpsc::UnboundedSender<InputEvent>) {
    std::thread::spawn(move || {
        let mut editor = match rustyline::DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                let _ = line_tx.send(InputEvent::Error(e.to_string()));
                return;
            }
        };

        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(&line);
                    if line_tx.send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    let _ = line_tx.send(InputEvent::Interrupted);
                    break;
                }
                Err(ReadlineError::Eof) => {
                    let _ = line_tx.send(InputEvent::Eof);
                    break;
                }
                Err(e) => {
                    let _ = line_tx.send(InputEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    });
}

fn make_event(user: &str, text: &str) -> ChatEvent {
    let (mentions_bot, raw_text) = match text.strip_prefix(MENTION_PREFIX) {
        Some(rest) => (true, rest.trim_start().to_owned()),
        None => (false, text.to_owned()),
    };
    ChatEvent {
        platform: PLATFORM.to_owned(),
        group_id: GROUP.to_owned(),
        user_id: user.to_owned(),
        message_id: Uuid::new_v4().to_string(),
        raw_text,
        timestamp: Some(Utc::now()),
        ingest_time: None,
        mentions_bot,
        from_bot: false,
        user_name: Some(user.to_owned()),
        group_name: Some(GROUP.to_owned()),
        is_private: false,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banter_core=info,banter_llm=info".into()),
        )
        .init();

    let cfg = BanterCfg::from_env();
    let bot_name = cfg.persona.name.clone();

    let llm: Option<Arc<dyn ChatClient>> = banter_llm::http::from_env()
        .map(|p| Arc::new(ProviderChat::new(Arc::new(p) as _)) as _);
    if llm.is_none() {
        println!("提示：未设置 BANTER_LLM_MODEL / BANTER_LLM_API_KEY，机器人只会发确认回执。");
    }

    let adapter = Arc::new(ConsoleAdapter { bot_name: bot_name.clone() });
    let orchestrator = Orchestrator::new(cfg, adapter as _, llm, Arc::new(SimDispatcher) as _);

    println!("群聊模拟器 — 你在和 {bot_name} 同群。/as <名字> 换人，@bot 开头是@它，/quit 退出。");

    let token = CancellationToken::new();
    spawn_sigint_canceler(token.clone());

    let (line_tx, mut line_rx) = mpsc::unbounded_channel();
    spawn_input_thread(line_tx);

    let mut current_user = "alice".to_owned();

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            line = line_rx.recv() => {
                let Some(line) = line else { break };
                match line {
                    InputEvent::Line(line) => {
                        let text = line.trim();
                        if text.is_empty() {
                            continue;
                        }
                        if matches!(text, "/q" | "/quit" | "/exit") {
                            break;
                        }
                        if let Some(name) = text.strip_prefix("/as ") {
                            current_user = name.trim().to_owned();
                            println!("(你现在是 {current_user})");
                            continue;
                        }
                        if text == "/status" {
                            let status = *orchestrator.status_rx().borrow();
                            println!(
                                "{}",
                                serde_json::json!({
                                    "sessions": status.sessions,
                                    "pending_debounces": status.pending_debounces,
                                    "energy": format!("{:.2}", status.energy),
                                    "replies_sent": status.replies_sent,
                                    "last_mode": status.last_mode.map(|m| m.as_str()),
                                })
                            );
                            continue;
                        }
                        orchestrator.handle_event(make_event(&current_user, text)).await;
                    }
                    InputEvent::Interrupted | InputEvent::Eof => break,
                    InputEvent::Error(e) => {
                        eprintln!("input error: {e}");
                        break;
                    }
                }
            }
        }
    }

    orchestrator.shutdown();
    println!();
    Ok(())
}

fn spawn_sigint_canceler(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(_) => {
                    let _ = ctrl_c.await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        token.cancel();
    });
}
