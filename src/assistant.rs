//! Generation side of commit-lens: backends, context assembly, conversation
//! handling and answer parsing.

pub mod backend;
pub mod claude;
pub mod context;
pub mod conversation;
pub mod extract;
pub mod gemini;
pub mod model_config;
pub mod prompts;
pub mod token_budget;

use anyhow::{Context, Result};
use tracing::debug;

pub use backend::{BackendMetadata, FinishReason, Generation, GenerationBackend, Role, Turn};
pub use claude::ClaudeClient;
pub use context::{
    CommitRef, ContextBlock, ContextBudgeter, ContextPolicy, ExcludedCommit, ExclusionReason,
    TargetContext,
};
pub use conversation::{advance, trim_history, Exchange};
pub use extract::{extract_section, extract_sections, AnalysisSections};
pub use gemini::GeminiClient;

use crate::utils::preflight::{check_ai_credentials, AiProvider};
use crate::utils::settings::Settings;

/// Creates the generation backend selected by the environment.
pub fn create_default_backend(
    settings: &Settings,
    model_override: Option<&str>,
) -> Result<Box<dyn GenerationBackend>> {
    let info = check_ai_credentials(settings, model_override)?;
    debug!(provider = %info.provider, model = ?info.model, "Creating generation backend");

    let backend: Box<dyn GenerationBackend> = match info.provider {
        AiProvider::Gemini => Box::new(
            GeminiClient::new(info.api_key, info.model, &info.api_base)
                .context("Failed to create Gemini client")?,
        ),
        AiProvider::Claude => Box::new(
            ClaudeClient::new(info.api_key, info.model, &info.api_base)
                .context("Failed to create Claude client")?,
        ),
    };
    Ok(backend)
}
