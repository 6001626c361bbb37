//! Preflight validation checks for early failure detection
//!
//! Commands call these checks before any network traffic to fail fast with
//! clear messages when credentials are missing.

use std::fmt;

use anyhow::{anyhow, bail, Result};

use crate::assistant::model_config::get_model_registry;
use crate::assistant::{claude, gemini};
use crate::github::types::Credentials;
use crate::utils::settings::Settings;

/// Result of AI credential validation
pub struct AiCredentialInfo {
    /// The AI provider that will be used
    pub provider: AiProvider,
    /// Explicit model, if configured; otherwise discovered at first use
    pub model: Option<String>,
    /// API key for the provider
    pub api_key: String,
    /// API base URL for the provider
    pub api_base: String,
}

impl fmt::Debug for AiCredentialInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiCredentialInfo")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// AI provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    /// Google Gemini API
    Gemini,
    /// Anthropic Claude API
    Claude,
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiProvider::Gemini => write!(f, "Gemini API"),
            AiProvider::Claude => write!(f, "Claude API"),
        }
    }
}

/// Validate AI credentials are available before processing
///
/// `COMMIT_LENS_PROVIDER` selects the provider (`gemini` by default).
/// The model comes from `model_override`, then `COMMIT_LENS_MODEL`.
pub fn check_ai_credentials(
    settings: &Settings,
    model_override: Option<&str>,
) -> Result<AiCredentialInfo> {
    let model = model_override
        .map(String::from)
        .or_else(|| settings.get_env_var("COMMIT_LENS_MODEL"));

    let provider = settings
        .get_env_var("COMMIT_LENS_PROVIDER")
        .unwrap_or_else(|| "gemini".to_string());

    match provider.trim().to_ascii_lowercase().as_str() {
        "gemini" => {
            let api_key = settings.get_env_var("GEMINI_API_KEY").ok_or_else(|| {
                anyhow!(
                    "Gemini API key not found.\n\
                     Set the GEMINI_API_KEY environment variable."
                )
            })?;
            Ok(AiCredentialInfo {
                provider: AiProvider::Gemini,
                model,
                api_key,
                api_base: api_base(settings, "GEMINI_API_URL", gemini::PROVIDER)?,
            })
        }
        "claude" | "anthropic" => {
            let api_key = settings
                .get_any_env_var(&["CLAUDE_API_KEY", "ANTHROPIC_API_KEY"])
                .ok_or_else(|| {
                    anyhow!(
                        "Claude API key not found.\n\
                         Set one of these environment variables:\n\
                         - CLAUDE_API_KEY\n\
                         - ANTHROPIC_API_KEY"
                    )
                })?;
            Ok(AiCredentialInfo {
                provider: AiProvider::Claude,
                model,
                api_key,
                api_base: api_base(settings, "CLAUDE_API_URL", claude::PROVIDER)?,
            })
        }
        other => bail!(
            "Unknown AI provider {other:?} in COMMIT_LENS_PROVIDER.\n\
             Expected one of: gemini, claude"
        ),
    }
}

/// API base from `override_key`, else the registry default for `provider`.
fn api_base(settings: &Settings, override_key: &str, provider: &str) -> Result<String> {
    if let Some(url) = settings.get_env_var(override_key) {
        return Ok(url);
    }
    get_model_registry()
        .api_base(provider)
        .map(String::from)
        .ok_or_else(|| anyhow!("No API base URL configured for {provider}. Set {override_key}."))
}

/// Validate a GitHub access token is available
///
/// Uses `token_override` (the `--token` flag), then `GITHUB_TOKEN`.
pub fn check_github_token(settings: &Settings, token_override: Option<&str>) -> Result<Credentials> {
    let token = token_override
        .map(String::from)
        .or_else(|| settings.get_env_var("GITHUB_TOKEN"))
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            anyhow!(
                "GitHub access token not found.\n\
                 Pass --token, set GITHUB_TOKEN, or run 'commit-lens auth url' to obtain one."
            )
        })?;
    Ok(Credentials::new(token.trim()))
}
