//! Chat command.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use tracing::debug;

use super::{Environment, GlobalArgs};
use crate::assistant::{trim_history, Turn};
use crate::error::LensError;
use crate::github::types::{Credentials, RepoRef};
use crate::service::{ChatRequest, ChatResponse, CommitLens};

/// Asks questions about selected commits.
#[derive(Parser)]
pub struct ChatCommand {
    /// Repository in owner/name form.
    pub repo: RepoRef,

    /// Commit SHA (or prefix) to discuss; repeat for several commits.
    #[arg(long = "commit", required = true)]
    pub commits: Vec<String>,

    /// Question to ask; starts an interactive session when omitted.
    #[arg(long)]
    pub question: Option<String>,

    /// JSON file holding the conversation history; rewritten after each answer.
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Keeps at most this many history turns before each request.
    #[arg(long)]
    pub max_history_turns: Option<usize>,
}

impl ChatCommand {
    /// Executes the chat command.
    pub async fn execute(self, globals: &GlobalArgs) -> Result<()> {
        let env = Environment::load()?;
        let creds = env.credentials(globals)?;
        let lens = env.lens(globals)?;
        let history = match &self.history {
            Some(path) => load_history(path)?,
            None => Vec::new(),
        };

        match self.question.clone() {
            Some(question) => {
                let response = self.ask(&lens, &creds, &history, question).await?;
                report_partial_context(&response);
                println!("{}", response.answer);
                Ok(())
            }
            None => self.chat_loop(&lens, &creds, history).await,
        }
    }

    async fn ask(
        &self,
        lens: &CommitLens,
        creds: &Credentials,
        history: &[Turn],
        question: String,
    ) -> Result<ChatResponse> {
        let history = match self.max_history_turns {
            Some(max) => trim_history(history.to_vec(), max),
            None => history.to_vec(),
        };
        let request = ChatRequest {
            commits: self.commits.clone(),
            question,
            history,
        };
        let response = lens.chat(&self.repo, creds, request).await?;
        if let Some(path) = &self.history {
            save_history(path, &response.history)?;
        }
        Ok(response)
    }

    async fn chat_loop(
        &self,
        lens: &CommitLens,
        creds: &Credentials,
        mut history: Vec<Turn>,
    ) -> Result<()> {
        eprintln!(
            "Chatting about {} commit(s) in {}",
            self.commits.len(),
            self.repo
        );
        eprintln!("Enter to send, Shift+Enter for newline, Ctrl+D to exit.\n");

        loop {
            let input = match read_user_input() {
                Ok(Some(text)) => text,
                Ok(None) => {
                    eprintln!("\nGoodbye!");
                    break;
                }
                Err(e) => {
                    eprintln!("\nInput error: {e}");
                    break;
                }
            };

            let trimmed = input.trim();
            if trimmed.is_empty() {
                continue;
            }

            match self.ask(lens, creds, &history, trimmed.to_string()).await {
                Ok(response) => {
                    report_partial_context(&response);
                    println!("{}\n", response.answer);
                    history = response.history;
                }
                Err(e) => match recoverable(&e) {
                    Some(err) => {
                        eprintln!("Error [{}]: {err}", err.kind());
                        if err.is_retryable() {
                            eprintln!("Ask again to retry.\n");
                        } else {
                            eprintln!();
                        }
                    }
                    None => return Err(e),
                },
            }
        }

        Ok(())
    }
}

/// Returns the engine error when the session can go on after it.
///
/// The history is unchanged by a failed request, so the user can retry or
/// rephrase. Rejected credentials, unknown commits and local failures end
/// the session.
fn recoverable(e: &anyhow::Error) -> Option<&LensError> {
    let err = e.chain().find_map(|cause| cause.downcast_ref::<LensError>())?;
    match err {
        LensError::Transient(_)
        | LensError::GenerationEmpty(_)
        | LensError::GenerationBlocked { .. }
        | LensError::OversizeInput { .. }
        | LensError::InvalidInput(_) => Some(err),
        LensError::NotFound(_) | LensError::Forbidden(_) | LensError::Internal(_) => None,
    }
}

fn report_partial_context(response: &ChatResponse) {
    if !response.excluded.is_empty() {
        let left_out: Vec<String> = response
            .excluded
            .iter()
            .map(|c| c.commit.number.to_string())
            .collect();
        eprintln!(
            "Note: commits {} did not fit into the context",
            left_out.join(", ")
        );
    }
}

/// Reads a history file; a missing file is an empty history.
fn load_history(path: &Path) -> Result<Vec<Turn>> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
        Ok(text) => serde_json::from_str(&text)
            .with_context(|| format!("Invalid history file {}", path.display())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "History file does not exist yet");
            Ok(Vec::new())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

fn save_history(path: &Path, history: &[Turn]) -> Result<()> {
    let json = serde_json::to_string_pretty(history)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Guard that disables raw mode on drop.
struct RawModeGuard;

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Reads multiline user input with "> " prompt.
///
/// Returns `Ok(Some(text))` on Enter, `Ok(None)` on Ctrl+D/Ctrl+C.
fn read_user_input() -> Result<Option<String>> {
    eprint!("> ");
    io::stderr().flush()?;

    enable_raw_mode()?;
    let _guard = RawModeGuard;

    let mut buffer = String::new();

    loop {
        if let Event::Key(key_event) = event::read()? {
            match key_event.code {
                KeyCode::Enter => {
                    if key_event.modifiers.contains(KeyModifiers::SHIFT) {
                        buffer.push('\n');
                        eprint!("\r\n... ");
                        io::stderr().flush()?;
                    } else {
                        eprint!("\r\n");
                        io::stderr().flush()?;
                        return Ok(Some(buffer));
                    }
                }
                KeyCode::Char('d') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                    if buffer.is_empty() {
                        return Ok(None);
                    }
                    eprint!("\r\n");
                    io::stderr().flush()?;
                    return Ok(Some(buffer));
                }
                KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(None);
                }
                KeyCode::Char(c) => {
                    buffer.push(c);
                    eprint!("{c}");
                    io::stderr().flush()?;
                }
                KeyCode::Backspace => {
                    if buffer.pop().is_some() {
                        eprint!("\x08 \x08");
                        io::stderr().flush()?;
                    }
                }
                _ => {}
            }
        }
    }
}
