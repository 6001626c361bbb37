//! Token estimation and budget validation for generation requests.
//!
//! Provides a lightweight heuristic to estimate token counts from text and
//! validates that an assembled conversation fits within a model's input
//! context window before the backend is called.

use crate::assistant::backend::{BackendMetadata, Turn};
use crate::error::{LensError, Result};

/// Approximate characters per token for heuristic estimation.
const CHARS_PER_TOKEN: f64 = 3.5;

/// Safety margin multiplier applied to token estimates.
///
/// Adds 10% overhead to account for tokenizer variance (special tokens,
/// whitespace handling, non-ASCII characters).
const SAFETY_MARGIN: f64 = 1.10;

/// Estimates the token count for a text string using a character-based heuristic.
///
/// Uses the approximation of 1 token per 3.5 characters with a 10% safety
/// margin. Overestimates rather than underestimates.
#[must_use]
pub(crate) fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_from_char_count(text.chars().count())
}

/// Estimates token count from a pre-computed character count.
#[must_use]
pub(crate) fn estimate_tokens_from_char_count(char_count: usize) -> usize {
    let raw_estimate = char_count as f64 / CHARS_PER_TOKEN;
    (raw_estimate * SAFETY_MARGIN).ceil() as usize
}

/// Result of a token budget validation.
#[derive(Debug, Clone)]
pub(crate) struct TokenEstimate {
    /// Estimated tokens across all turns.
    pub estimated_tokens: usize,
    /// Maximum available input tokens for this model.
    pub available_tokens: usize,
    /// Utilization percentage (0.0 to 100.0+).
    pub utilization_pct: f64,
}

/// Token budget derived from backend metadata.
#[derive(Debug, Clone)]
pub(crate) struct TokenBudget {
    /// Model identifier (for error messages).
    model: String,
    /// Total context window (input + output).
    max_context_length: usize,
    /// Tokens reserved for the model's response.
    reserved_output_tokens: usize,
}

impl TokenBudget {
    /// Creates a token budget from backend metadata.
    #[must_use]
    pub fn from_metadata(metadata: &BackendMetadata) -> Self {
        Self {
            model: metadata.model.clone(),
            max_context_length: metadata.max_context_length,
            reserved_output_tokens: metadata.max_response_length,
        }
    }

    /// Maximum number of input tokens available after reserving output tokens.
    #[must_use]
    pub(crate) fn available_input_tokens(&self) -> usize {
        self.max_context_length
            .saturating_sub(self.reserved_output_tokens)
    }

    /// Validates that the conversation fits within the input token budget.
    ///
    /// Returns [`LensError::OversizeInput`] when the estimate exceeds the
    /// available budget.
    pub fn validate(&self, turns: &[Turn]) -> Result<TokenEstimate> {
        let estimated_tokens = turns.iter().map(|t| estimate_tokens(&t.content)).sum();
        let available = self.available_input_tokens();
        let utilization_pct = if available > 0 {
            (estimated_tokens as f64 / available as f64) * 100.0
        } else {
            f64::INFINITY
        };

        if estimated_tokens > available {
            return Err(LensError::OversizeInput {
                detail: format!("Prompt for model '{}' exceeds its input budget", self.model),
                size: estimated_tokens,
                limit: available,
            });
        }

        Ok(TokenEstimate {
            estimated_tokens,
            available_tokens: available,
            utilization_pct,
        })
    }
}
