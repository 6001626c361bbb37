//! Stateless multi-turn conversation handling.
//!
//! The caller owns the history. Each call receives it, sends it to the
//! backend followed by a new user turn (context block, then question) and
//! returns it extended by exactly the question and the answer.

use tracing::{debug, info};

use crate::assistant::backend::{GenerationBackend, Role, Turn};
use crate::assistant::prompts;
use crate::assistant::token_budget::TokenBudget;
use crate::error::{LensError, Result};

/// Outcome of one conversation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// The model answer.
    pub answer: String,
    /// Input history plus the question and the answer.
    pub history: Vec<Turn>,
}

/// Asks `question` about `context` on top of `history`.
///
/// The request is checked against the model's input budget before the
/// backend is called. The context block is sent but not recorded in the
/// returned history; the question is recorded verbatim. `history` is left
/// untouched, so on error the caller still holds the full transcript.
pub async fn advance(
    backend: &dyn GenerationBackend,
    history: &[Turn],
    question: &str,
    context: &str,
) -> Result<Exchange> {
    let question_text = question.trim();
    if question_text.is_empty() {
        return Err(LensError::InvalidInput("The question is empty".to_string()));
    }

    let mut request = history.to_vec();
    request.push(Turn::user(prompts::chat_turn(context, question)));

    let metadata = backend.metadata().await?;
    let estimate = TokenBudget::from_metadata(&metadata).validate(&request)?;
    debug!(
        estimated_tokens = estimate.estimated_tokens,
        available_tokens = estimate.available_tokens,
        utilization_pct = format!("{:.1}", estimate.utilization_pct),
        "Conversation request fits the token budget"
    );

    info!(
        model = %metadata.model,
        history_turns = history.len(),
        context_chars = context.len(),
        "Sending conversation request"
    );
    let answer = backend.generate(&request).await?.into_text()?;

    let mut history = history.to_vec();
    history.push(Turn::user(question));
    history.push(Turn::model(answer.clone()));
    Ok(Exchange { answer, history })
}

/// Sends a single prompt without history and returns the answer text.
pub async fn ask(backend: &dyn GenerationBackend, prompt: String) -> Result<String> {
    let request = [Turn::user(prompt)];
    let metadata = backend.metadata().await?;
    TokenBudget::from_metadata(&metadata).validate(&request)?;
    info!(model = %metadata.model, prompt_chars = request[0].content.len(), "Sending one-shot request");
    backend.generate(&request).await?.into_text()
}

/// Drops the oldest question/answer pairs so at most `max_turns` remain.
///
/// Turns are removed from the front in whole pairs; a leading model turn
/// without its question is removed along with them.
pub fn trim_history(mut history: Vec<Turn>, max_turns: usize) -> Vec<Turn> {
    if history.len() <= max_turns {
        return history;
    }
    let excess = history.len() - max_turns;
    let mut cut = (excess + excess % 2).min(history.len());
    while history.get(cut).is_some_and(|t| t.role == Role::Model) {
        cut += 1;
    }
    debug!(dropped = cut, kept = history.len() - cut, "Trimming conversation history");
    history.drain(..cut);
    history
}
