//! Generation model registry and selection policy.
//!
//! Model limits and per-provider preference lists are loaded from an
//! embedded YAML template.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{LensError, Result};

/// Model specification from YAML configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ModelSpec {
    /// Provider key (e.g., "gemini")
    pub provider: String,
    /// Human-readable model name
    pub model: String,
    /// API identifier used for requests
    pub api_identifier: String,
    /// Maximum number of tokens that can be generated in a single response
    pub max_output_tokens: usize,
    /// Maximum number of tokens that can be included in the input context
    pub input_context: usize,
    /// Performance tier (e.g., "fast", "balanced", "flagship")
    pub tier: String,
    /// Whether this is a legacy model that may be deprecated
    #[serde(default)]
    pub legacy: bool,
}

/// Default fallback limits for a provider
#[derive(Debug, Deserialize)]
pub struct DefaultConfig {
    /// Default maximum output tokens for unknown models
    pub max_output_tokens: usize,
    /// Default input context limit for unknown models
    pub input_context: usize,
}

/// Provider-specific configuration
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    /// Base URL for API requests, used unless overridden
    pub api_base: String,
    /// Models to pick, most preferred first
    pub preferred: Vec<String>,
    /// Defaults for unknown models
    pub defaults: DefaultConfig,
}

/// Complete model configuration
#[derive(Debug, Deserialize)]
pub struct ModelConfiguration {
    /// Provider-specific configurations
    pub providers: HashMap<String, ProviderConfig>,
    /// All known models
    pub models: Vec<ModelSpec>,
}

/// Model registry for looking up specifications
pub struct ModelRegistry {
    config: ModelConfiguration,
    by_identifier: HashMap<String, ModelSpec>,
}

impl ModelRegistry {
    /// Load model registry from embedded YAML
    pub fn load() -> Result<Self> {
        Self::from_yaml(include_str!("../templates/models.yaml"))
    }

    /// Parse a registry from YAML text
    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        let config: ModelConfiguration = serde_yaml::from_str(yaml_content)
            .map_err(|e| LensError::Internal(format!("Invalid model registry: {e}")))?;
        let by_identifier = config
            .models
            .iter()
            .map(|m| (m.api_identifier.clone(), m.clone()))
            .collect();
        Ok(Self {
            config,
            by_identifier,
        })
    }

    /// Get model specification by API identifier.
    ///
    /// Accepts the `models/` prefix some APIs put in front of names.
    pub fn get_model_spec(&self, api_identifier: &str) -> Option<&ModelSpec> {
        let id = api_identifier
            .strip_prefix("models/")
            .unwrap_or(api_identifier);
        self.by_identifier.get(id)
    }

    /// Get provider configuration
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.config.providers.get(provider)
    }

    /// Default API base URL for a provider
    pub fn api_base(&self, provider: &str) -> Option<&str> {
        self.get_provider_config(provider)
            .map(|p| p.api_base.as_str())
    }

    /// Ordered preference list for a provider
    pub fn preferred_models(&self, provider: &str) -> &[String] {
        self.get_provider_config(provider)
            .map(|p| p.preferred.as_slice())
            .unwrap_or_default()
    }

    /// Get max output tokens for a model, with fallback to provider defaults
    pub fn get_max_output_tokens(&self, provider: &str, api_identifier: &str) -> usize {
        if let Some(spec) = self.get_model_spec(api_identifier) {
            return spec.max_output_tokens;
        }
        self.get_provider_config(provider)
            .map_or(4096, |p| p.defaults.max_output_tokens)
    }

    /// Get input context limit for a model, with fallback to provider defaults
    pub fn get_input_context(&self, provider: &str, api_identifier: &str) -> usize {
        if let Some(spec) = self.get_model_spec(api_identifier) {
            return spec.input_context;
        }
        self.get_provider_config(provider)
            .map_or(100_000, |p| p.defaults.input_context)
    }

    /// Logs the model a backend settled on, warning about legacy models
    pub fn log_selection(&self, provider: &str, api_identifier: &str) {
        match self.get_model_spec(api_identifier) {
            Some(spec) if spec.legacy => warn!(
                provider,
                model = api_identifier,
                name = %spec.model,
                tier = %spec.tier,
                "Selected model is marked legacy"
            ),
            Some(spec) => info!(
                provider,
                model = api_identifier,
                name = %spec.model,
                tier = %spec.tier,
                "Using model"
            ),
            None => info!(
                provider,
                model = api_identifier,
                "Using model without registry entry, provider defaults apply"
            ),
        }
    }
}

/// Picks a model from what a backend advertises.
///
/// Returns the first entry of `preferred` that appears in `available`,
/// otherwise the first available model, otherwise `None`.
pub fn select_model(preferred: &[String], available: &[String]) -> Option<String> {
    if let Some(found) = preferred.iter().find(|p| available.contains(p)) {
        info!(model = %found, "Selected preferred model");
        return Some(found.clone());
    }
    let fallback = available.first().cloned();
    if let Some(ref model) = fallback {
        info!(model = %model, "No preferred model available, using first advertised model");
    } else {
        debug!("Backend advertised no usable models");
    }
    fallback
}

/// Global model registry instance
static MODEL_REGISTRY: OnceLock<ModelRegistry> = OnceLock::new();

/// Get the global model registry instance
#[allow(clippy::expect_used)]
pub fn get_model_registry() -> &'static ModelRegistry {
    MODEL_REGISTRY.get_or_init(|| ModelRegistry::load().expect("Failed to load model registry"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn embedded_registry_loads() {
        let registry = ModelRegistry::load().unwrap();
        assert!(registry.get_provider_config("gemini").is_some());
        assert!(registry.get_provider_config("claude").is_some());
        assert_eq!(registry.preferred_models("gemini")[0], "gemini-1.5-flash");
        assert_eq!(
            registry.api_base("gemini"),
            Some("https://generativelanguage.googleapis.com")
        );
        assert_eq!(registry.api_base("claude"), Some("https://api.anthropic.com"));
        assert_eq!(registry.api_base("nobody"), None);
    }

    #[test]
    fn lookups_fall_back_to_provider_defaults() {
        let registry = ModelRegistry::load().unwrap();
        assert_eq!(
            registry.get_max_output_tokens("claude", "claude-sonnet-4-20250514"),
            64000
        );
        assert_eq!(registry.get_input_context("gemini", "gemini-9-ultra"), 1_000_000);
        assert_eq!(registry.get_max_output_tokens("nobody", "mystery"), 4096);
    }

    #[test]
    fn models_prefix_is_ignored() {
        let registry = ModelRegistry::load().unwrap();
        let spec = registry.get_model_spec("models/gemini-1.5-pro").unwrap();
        assert_eq!(spec.tier, "flagship");
        assert_eq!(spec.model, "Gemini 1.5 Pro");
        assert!(registry.get_model_spec("gemini-1.0-pro").unwrap().legacy);
        assert!(!spec.legacy);
    }

    #[test]
    fn select_prefers_preference_order() {
        let preferred = names(&["a", "b", "c"]);
        let available = names(&["z", "c", "b"]);
        assert_eq!(select_model(&preferred, &available), Some("b".to_string()));
    }

    #[test]
    fn select_falls_back_to_first_available() {
        let preferred = names(&["a"]);
        let available = names(&["x", "y"]);
        assert_eq!(select_model(&preferred, &available), Some("x".to_string()));
    }

    #[test]
    fn select_with_nothing_available() {
        assert_eq!(select_model(&names(&["a"]), &[]), None);
    }
}
