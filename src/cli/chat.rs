use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::anthropic::AnthropicClient;
use crate::chat::{ChatBuilder, ChatSession, NewChat, TranscriptView, TurnView};
use crate::core::{AppConfig, load_api_key};

const HELP: &str = r"Type a message and press enter to send it. Commands:
  /show              redraw the whole conversation
  /edit <n>          edit message n (enter commits, ctrl-c cancels)
  /context <n>       number of trailing messages sent as context
  /temp <t>          temperature between 0.0 and 1.0
  /tokens <n>        max tokens in the reply
  /system [text]     set or clear the persistent instructions
  /attach <pdf>      send a PDF with the next messages
  /detach            stop sending the PDF
  /save <file>       save the conversation as JSON
  /load <file>       open a saved conversation
  /new               start over (run twice to confirm)
  /settings          show current settings
  /quit              exit";

#[derive(Debug, PartialEq)]
pub enum Command {
    Send(String),
    Show,
    Edit(usize),
    Context(String),
    Temperature(String),
    MaxTokens(String),
    System(String),
    Attach(PathBuf),
    Detach,
    Save(PathBuf),
    Load(PathBuf),
    NewChat,
    Settings,
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Command::Send(line.to_string());
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match (name, arg) {
            ("show", _) => Command::Show,
            ("edit", n) => n
                .parse::<usize>()
                .map(Command::Edit)
                .unwrap_or_else(|_| Command::Invalid(String::from("Usage: /edit <n>"))),
            ("context", n) if !n.is_empty() => Command::Context(n.to_string()),
            ("temp", t) if !t.is_empty() => Command::Temperature(t.to_string()),
            ("tokens", n) if !n.is_empty() => Command::MaxTokens(n.to_string()),
            ("system", text) => Command::System(text.to_string()),
            ("attach", p) if !p.is_empty() => Command::Attach(PathBuf::from(p)),
            ("detach", _) => Command::Detach,
            ("save", p) if !p.is_empty() => Command::Save(PathBuf::from(p)),
            ("load", p) if !p.is_empty() => Command::Load(PathBuf::from(p)),
            ("new", _) => Command::NewChat,
            ("settings", _) => Command::Settings,
            ("help", _) => Command::Help,
            ("quit", _) | ("exit", _) => Command::Quit,
            _ => Command::Invalid(format!("Unknown command /{}, try /help", name)),
        }
    }
}

fn render_turn(turn: &TurnView) -> String {
    let mut header = format!("[{}] {}", turn.index + 1, turn.label);
    if turn.edited {
        header.push_str(" (edited)");
    }
    if !turn.in_context {
        header.push_str("  OUT OF CONTEXT WINDOW");
    }
    format!("{}\n{}\n", header, turn.text)
}

/// Prints turns the user hasn't seen yet. Anything that rewrites
/// history (edits, loads, resets) should pass `shown = 0`.
fn render(view: &TranscriptView, shown: usize) -> usize {
    let start = if shown > view.turns.len() { 0 } else { shown };
    for turn in &view.turns[start..] {
        println!("{}", render_turn(turn));
    }
    view.turns.len()
}

/// Names the already printed turns that were in context before the
/// last action and no longer are, since their markers are now stale.
fn window_shift_notice(
    previous_start: usize,
    shown: usize,
    view: &TranscriptView,
) -> Option<String> {
    let end = view.context_start.min(shown);
    if end <= previous_start {
        return None;
    }
    let msg = if end - previous_start == 1 {
        format!("Message {} left the context window", end)
    } else {
        format!(
            "Messages {}-{} left the context window",
            previous_start + 1,
            end
        )
    };
    Some(format!("{} ({})", msg, view.summary()))
}

fn render_settings(session: &ChatSession) {
    let config = session.config();
    println!("model:        {}", session.model());
    println!("temperature:  {}", config.temperature);
    println!("max tokens:   {}", config.max_output_tokens);
    println!("context size: {}", config.window_size);
    println!(
        "system:       {}",
        config.system().unwrap_or_else(|| String::from("(none)"))
    );
    match &config.attachment {
        Some(a) => println!(
            "attachment:   {} ({} bytes)",
            a.path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| String::from("(unnamed)")),
            a.data.len()
        ),
        None => println!("attachment:   (none)"),
    }
    if let Some(path) = session.loaded_from() {
        println!("loaded from:  {}", path.display());
    }
    println!("{}", session.view().summary());
}

fn build_session(config: &AppConfig) -> Result<ChatSession> {
    let builder =
        ChatBuilder::new(&config.anthropic_model).api_key_path(&config.api_key_path);
    let builder = match load_api_key(&config.api_key_path)? {
        Some(key) => builder.client(Box::new(AnthropicClient::new(
            &config.anthropic_api_hostname,
            &key,
        ))),
        None => builder,
    };
    Ok(builder.build())
}

fn edit_turn(rl: &mut DefaultEditor, session: &mut ChatSession, n: usize) -> Result<bool> {
    let view = session.view();
    let Some(turn) = n.checked_sub(1).and_then(|i| view.turns.get(i)) else {
        println!("No message {}", n);
        return Ok(false);
    };

    match rl.readline_with_initial("edit> ", (turn.text.as_str(), "")) {
        Ok(text) => Ok(session.edit_turn(turn.handle, &text)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

pub async fn run(config: AppConfig, load: Option<PathBuf>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut session = build_session(&config)?;
    if let Some(path) = load.as_deref() {
        session.load(path);
    }

    println!("{}", HELP);
    println!();
    let view = session.view();
    let mut shown = render(&view, 0);
    let mut context_start = view.context_start;

    loop {
        let prompt = if session.new_chat_pending(Instant::now()) {
            "confirm /new >>> "
        } else {
            ">>> "
        };
        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };
        if !line.trim().is_empty() {
            let _ = rl.add_history_entry(line.as_str());
        }

        // Whether earlier turns may now read differently
        let mut redraw = false;
        match Command::parse(&line) {
            Command::Send(text) => {
                session.send(&text).await;
            }
            Command::Show => redraw = true,
            Command::Edit(n) => redraw = edit_turn(&mut rl, &mut session, n)?,
            Command::Context(n) => redraw = session.set_window_size(&n),
            Command::Temperature(t) => session.set_temperature(&t),
            Command::MaxTokens(n) => session.set_max_tokens(&n),
            Command::System(text) => session.set_system_prompt(&text),
            Command::Attach(path) => {
                if session.attach(&path) {
                    println!("Attached {}", path.display());
                }
            }
            Command::Detach => {
                session.clear_attachment();
                println!("Attachment cleared");
            }
            Command::Save(path) => {
                if session.save(&path) {
                    println!("Saved to {}", path.display());
                }
            }
            Command::Load(path) => redraw = load_conversation(&mut session, &path),
            Command::NewChat => match session.request_new_chat(Instant::now()) {
                NewChat::Armed => println!("Run /new again within 2 seconds to confirm"),
                NewChat::Reset => {
                    println!("Started a new chat");
                    redraw = true;
                }
            },
            Command::Settings => render_settings(&session),
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
            Command::Invalid(msg) => println!("{}", msg),
        }

        let view = session.view();
        if redraw {
            println!("{}", view.summary());
            shown = render(&view, 0);
        } else {
            if let Some(notice) = window_shift_notice(context_start, shown, &view) {
                println!("{}\n", notice);
            }
            shown = render(&view, shown);
        }
        context_start = view.context_start;
    }

    Ok(())
}

fn load_conversation(session: &mut ChatSession, path: &Path) -> bool {
    let loaded = session.load(path);
    if loaded {
        println!("Loaded {}", path.display());
    }
    // A failed load only appends a notice, which the normal render picks up
    loaded
}
