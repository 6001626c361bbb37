//! Generation backend trait, conversation turns and shared client helpers.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LensError, Result};

/// HTTP request timeout for generation API calls.
///
/// Set to 5 minutes to accommodate large diff contexts and long answers
/// while preventing indefinite hangs.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions.
    User,
    /// The generation backend.
    Model,
}

/// One entry of a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced the turn.
    pub role: Role,
    /// Text of the turn.
    #[serde(alias = "parts")]
    pub content: String,
}

impl Turn {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A model turn.
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// Why the backend stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of the answer.
    Complete,
    /// Stopped or withheld on policy grounds.
    Blocked,
    /// Cut off by the output token limit.
    Truncated,
    /// Any other backend-specific reason.
    Other(String),
}

/// Raw outcome of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Generated text, possibly empty.
    pub text: String,
    /// Finish reason reported by the backend.
    pub finish: FinishReason,
    /// Block reason when the prompt or answer was refused.
    pub block_reason: Option<String>,
}

impl Generation {
    /// Converts the outcome into answer text, classifying failures.
    ///
    /// Blocked outcomes become [`LensError::GenerationBlocked`]; empty text
    /// or any finish reason other than [`FinishReason::Complete`] becomes
    /// [`LensError::GenerationEmpty`].
    pub fn into_text(self) -> Result<String> {
        if self.finish == FinishReason::Blocked || self.block_reason.is_some() {
            return Err(LensError::GenerationBlocked {
                reason: self.block_reason.unwrap_or_else(|| "unspecified".to_string()),
            });
        }
        match self.finish {
            FinishReason::Complete if !self.text.trim().is_empty() => Ok(self.text),
            FinishReason::Complete => Err(LensError::GenerationEmpty(
                "response contained no text".to_string(),
            )),
            FinishReason::Truncated => Err(LensError::GenerationEmpty(
                "response was cut off by the output token limit".to_string(),
            )),
            FinishReason::Other(reason) => Err(LensError::GenerationEmpty(format!(
                "generation stopped early ({reason})"
            ))),
            FinishReason::Blocked => Err(LensError::Internal(
                "blocked generation reached text conversion".to_string(),
            )),
        }
    }
}

/// Metadata about a generation backend.
#[derive(Clone, Debug)]
pub struct BackendMetadata {
    /// Service provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Maximum context length in tokens.
    pub max_context_length: usize,
    /// Maximum response length in tokens.
    pub max_response_length: usize,
}

/// Trait for generative-text services.
pub trait GenerationBackend: Send + Sync {
    /// Generates the next model turn for the given conversation.
    fn generate<'a>(&'a self, turns: &'a [Turn]) -> BoxFuture<'a, Result<Generation>>;

    /// Returns metadata about the backend and its model.
    ///
    /// Resolves the model on first use when it was not configured.
    fn metadata(&self) -> BoxFuture<'_, Result<BackendMetadata>>;
}

// ── Shared helpers for backend implementations ──────────────────────

/// Builds an HTTP client with the standard request timeout.
pub(crate) fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| LensError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Maps a failed backend response to an error, passing successes through.
pub(crate) async fn check_error_response(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_else(|e| {
        debug!("Failed to read error response body: {e}");
        String::new()
    });
    let snippet: String = error_text.chars().take(500).collect();
    let message = format!("{provider} API request failed (HTTP {status}): {snippet}");
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        Err(LensError::Forbidden(message))
    } else if status == reqwest::StatusCode::PAYLOAD_TOO_LARGE {
        Err(LensError::OversizeInput {
            detail: message,
            size: 0,
            limit: 0,
        })
    } else if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
        Err(LensError::InvalidInput(message))
    } else {
        Err(LensError::Transient(message))
    }
}

/// Logs the outcome of a generation call.
pub(crate) fn log_generation(provider: &str, generation: &Generation) {
    debug!(
        response_len = generation.text.len(),
        finish = ?generation.finish,
        "Received {} API response",
        provider
    );
    debug!(response_content = %generation.text, "{} API response content", provider);
}
