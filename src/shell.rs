//! Line-oriented terminal front end
//!
//! Plain text submits a query. Slash commands map to the other intents.
//! Positions are shown and accepted 1-based.

use crate::runtime::{ConversationHandle, UiEvent};
use crate::state_machine::{
    Event, MessageKind, NoticeLevel, PendingCall, PromptEntry, PromptOp, RemoteStatus, Session,
    SyncStatus, TurnPhase,
};
use std::fmt::Write as _;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

pub const HELP: &str = "\
Type a query and press enter to start a turn.
  /prompts          reload the prompt list
  /add              add an empty prompt
  /edit N text      replace the text of prompt N
  /save N           save new prompt N
  /update N         push edits of prompt N
  /rm N             remove prompt N
  /go               generate responses
  /pick N           highlight response N
  /select [N]       select response N, or the highlighted one
  /continue         start the next turn
  /done             end the conversation
  /new              start a new conversation
  /retry            resend a notification the service did not record
  /help             show this help
  /quit             exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Intent(Event),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown command {0}, try /help")]
    UnknownCommand(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("{0:?} is not a position (use 1, 2, ...)")]
    InvalidPosition(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    // Queries go out as typed
    let Some(command) = trimmed.strip_prefix('/') else {
        return Ok(Some(Command::Intent(Event::SubmitQuery {
            text: line.to_string(),
        })));
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    let event = match name {
        "help" => return Ok(Some(Command::Help)),
        "quit" | "exit" => return Ok(Some(Command::Quit)),
        "prompts" => Event::LoadPrompts,
        "add" => Event::AddPrompt,
        "edit" => {
            let (position, text) = rest
                .split_once(char::is_whitespace)
                .ok_or(ParseError::Usage("/edit N text"))?;
            Event::EditPrompt {
                index: parse_position(position)?,
                text: text.trim().to_string(),
            }
        }
        "save" => Event::SavePrompt {
            index: required_position(rest, "/save N")?,
        },
        "update" => Event::UpdatePrompt {
            index: required_position(rest, "/update N")?,
        },
        "rm" => Event::RemovePrompt {
            index: required_position(rest, "/rm N")?,
        },
        "go" => Event::RequestResponses,
        "pick" => Event::HighlightResponse {
            index: required_position(rest, "/pick N")?,
        },
        "select" if rest.is_empty() => Event::ConfirmSelection,
        "select" => Event::SelectResponse {
            index: parse_position(rest)?,
        },
        "continue" => Event::ContinueConversation,
        "done" => Event::EndConversation,
        "new" => Event::StartNewConversation,
        "retry" => Event::RetryNotification,
        other => return Err(ParseError::UnknownCommand(format!("/{other}"))),
    };
    Ok(Some(Command::Intent(event)))
}

fn required_position(rest: &str, usage: &'static str) -> Result<usize, ParseError> {
    if rest.is_empty() {
        return Err(ParseError::Usage(usage));
    }
    parse_position(rest)
}

/// 1-based position to 0-based index
fn parse_position(raw: &str) -> Result<usize, ParseError> {
    match raw.parse::<usize>() {
        Ok(position) if position > 0 => Ok(position - 1),
        _ => Err(ParseError::InvalidPosition(raw.to_string())),
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Turns runtime updates into terminal lines, printing only what changed
#[derive(Debug, Default)]
pub struct Renderer {
    /// Transcript entries already printed
    shown_messages: usize,
    /// Last panel printed
    panel: String,
}

impl Renderer {
    pub fn render(&mut self, event: &UiEvent) -> Vec<String> {
        match event {
            UiEvent::StateChange { session } => self.render_session(session),
            UiEvent::Notice {
                level: NoticeLevel::Info,
                text,
            } => vec![format!("ok: {text}")],
            UiEvent::Notice {
                level: NoticeLevel::Error,
                text,
            } => vec![format!("error: {text}")],
            UiEvent::Rejected { message } => vec![format!("! {message}")],
        }
    }

    fn render_session(&mut self, session: &Session) -> Vec<String> {
        let mut lines = Vec::new();

        let messages = session.log.messages();
        if messages.len() < self.shown_messages {
            lines.push("--- new conversation ---".to_string());
            self.shown_messages = 0;
        }
        for message in &messages[self.shown_messages..] {
            lines.push(match message.kind {
                MessageKind::User => format!("you: {}", message.text),
                MessageKind::Bot => format!("bot: {}", message.text),
                MessageKind::Info => format!("  {}", message.text),
            });
        }
        self.shown_messages = messages.len();

        let panel = panel(session);
        if panel != self.panel {
            lines.extend(panel.lines().map(ToString::to_string));
            self.panel = panel;
        }
        lines
    }
}

fn panel(session: &Session) -> String {
    let mut out = String::new();
    if session.phase.prompt_panel_open() {
        if session.is_pending(&PendingCall::LoadPrompts) {
            out.push_str("Loading prompts...\n");
        } else if session.prompts.is_empty() {
            out.push_str("No prompts yet. /add creates one.\n");
        }
        for (i, entry) in session.prompts.entries().iter().enumerate() {
            let _ = writeln!(out, "  [{}] {}{}", i + 1, entry.content, sync_label(entry));
        }
    }

    match &session.phase {
        TurnPhase::Idle => out.push_str("Type a query to start.\n"),
        TurnPhase::PromptEditing => out.push_str("/go generates responses from these prompts.\n"),
        TurnPhase::ResponsePending => out.push_str("Generating responses...\n"),
        TurnPhase::ResponseSelecting {
            options,
            highlighted,
        } => {
            if options.is_empty() {
                out.push_str("The service returned no responses. /go tries again.\n");
            }
            for (i, option) in options.iter().enumerate() {
                let marker = if *highlighted == Some(i) { '>' } else { ' ' };
                let _ = writeln!(out, "{marker} ({}) {option}", i + 1);
            }
            out.push_str("/pick N, /select [N], or /go to regenerate.\n");
        }
        TurnPhase::PostSelection => out.push_str("/continue or /done?\n"),
        TurnPhase::Closed => out.push_str("Conversation ended. /new starts another.\n"),
    }

    if let Some(state) = &session.notification {
        if let RemoteStatus::Failed { .. } = state.status {
            let _ = writeln!(
                out,
                "The service did not record the {}. /retry sends it again.",
                state.notification.label()
            );
        }
    }
    out
}

fn sync_label(entry: &PromptEntry) -> String {
    match &entry.sync {
        SyncStatus::Synced => String::new(),
        SyncStatus::Draft => " (unsaved)".to_string(),
        SyncStatus::Modified => " (edited)".to_string(),
        SyncStatus::Saving => " (saving...)".to_string(),
        SyncStatus::Updating => " (updating...)".to_string(),
        SyncStatus::Deleting => " (deleting...)".to_string(),
        SyncStatus::Failed { op, message } => {
            let op = match op {
                PromptOp::Save => "save",
                PromptOp::Update => "update",
                PromptOp::Delete => "delete",
            };
            format!(" ({op} failed: {message})")
        }
    }
}

// ============================================================================
// Loop
// ============================================================================

/// Read commands from stdin until `/quit` or end of input
pub async fn run(handle: ConversationHandle) -> std::io::Result<()> {
    let mut updates = handle.subscribe();
    let printer = tokio::spawn(async move {
        let mut renderer = Renderer::default();
        loop {
            match updates.recv().await {
                Ok(event) => {
                    for line in renderer.render(&event) {
                        println!("{line}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Terminal fell behind the conversation");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => break,
            Ok(Some(Command::Help)) => println!("{HELP}"),
            Ok(Some(Command::Intent(event))) => {
                if let Err(e) = handle.send(event).await {
                    tracing::error!(error = %e, "Cannot deliver command");
                    break;
                }
            }
            Err(e) => println!("! {e}"),
        }
    }

    printer.abort();
    // Last handle: the runtime stops once outstanding calls finish
    drop(handle);
    Ok(())
}
