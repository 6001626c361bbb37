//! Runtime configuration for commit-lens.
//!
//! Values come from environment variables, falling back to
//! `~/.commit-lens/settings.json`, falling back to built-in defaults.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::utils::settings::Settings;

/// Default GitHub REST API base URL.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default GitHub OAuth base URL.
pub const DEFAULT_GITHUB_OAUTH_URL: &str = "https://github.com";

/// Default OAuth redirect target.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000";

/// Per-commit diff ceiling in characters.
pub const DEFAULT_DIFF_CEILING: usize = 50_000;

/// Context budget for chat requests in characters.
pub const DEFAULT_CHAT_BUDGET: usize = 75_000;

/// Context budget for commit analysis in characters.
pub const DEFAULT_ANALYSIS_BUDGET: usize = 75_000;

/// Maximum number of commits folded into one context block.
pub const DEFAULT_MAX_CONTEXT_COMMITS: usize = 10;

/// Maximum number of repositories held in the ledger cache.
pub const DEFAULT_CACHE_CAPACITY: u64 = 64;

/// Lifetime of a ledger cache entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// GitHub OAuth application credentials.
#[derive(Clone)]
pub struct OAuthApp {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Redirect URI registered with the OAuth app.
    pub redirect_uri: String,
}

impl std::fmt::Debug for OAuthApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthApp")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct LensConfig {
    /// GitHub REST API base URL.
    pub github_api_url: String,
    /// GitHub OAuth base URL.
    pub github_oauth_url: String,
    /// Per-commit diff ceiling in characters.
    pub diff_ceiling: usize,
    /// Chat context budget in characters.
    pub chat_budget: usize,
    /// Analysis context budget in characters.
    pub analysis_budget: usize,
    /// Count cap on commits per context block.
    pub max_context_commits: usize,
    /// Ledger cache capacity (repositories).
    pub cache_capacity: u64,
    /// Ledger cache entry lifetime.
    pub cache_ttl: Duration,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            github_oauth_url: DEFAULT_GITHUB_OAUTH_URL.to_string(),
            diff_ceiling: DEFAULT_DIFF_CEILING,
            chat_budget: DEFAULT_CHAT_BUDGET,
            analysis_budget: DEFAULT_ANALYSIS_BUDGET,
            max_context_commits: DEFAULT_MAX_CONTEXT_COMMITS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl LensConfig {
    /// Loads configuration from the default settings file and environment.
    pub fn load() -> Result<Self> {
        let settings = Settings::load()?;
        Self::from_settings(&settings)
    }

    /// Builds configuration from already-loaded settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            github_api_url: settings
                .get_env_var("GITHUB_API_URL")
                .unwrap_or(defaults.github_api_url),
            github_oauth_url: settings
                .get_env_var("GITHUB_OAUTH_URL")
                .unwrap_or(defaults.github_oauth_url),
            diff_ceiling: parse_or(settings, "COMMIT_LENS_DIFF_CEILING", defaults.diff_ceiling)?,
            chat_budget: parse_or(settings, "COMMIT_LENS_CHAT_BUDGET", defaults.chat_budget)?,
            analysis_budget: parse_or(
                settings,
                "COMMIT_LENS_ANALYSIS_BUDGET",
                defaults.analysis_budget,
            )?,
            max_context_commits: parse_or(
                settings,
                "COMMIT_LENS_MAX_CONTEXT_COMMITS",
                defaults.max_context_commits,
            )?
            .max(1),
            cache_capacity: parse_or(
                settings,
                "COMMIT_LENS_CACHE_CAPACITY",
                defaults.cache_capacity,
            )?,
            cache_ttl: Duration::from_secs(parse_or(
                settings,
                "COMMIT_LENS_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
        })
    }

    /// Reads the OAuth app credentials.
    pub fn oauth_app(settings: &Settings) -> Result<OAuthApp> {
        let client_id = settings
            .get_env_var("GITHUB_CLIENT_ID")
            .context("GITHUB_CLIENT_ID is not set")?;
        let client_secret = settings
            .get_env_var("GITHUB_CLIENT_SECRET")
            .context("GITHUB_CLIENT_SECRET is not set")?;
        let redirect_uri = settings
            .get_env_var("GITHUB_REDIRECT_URI")
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
        Ok(OAuthApp {
            client_id,
            client_secret,
            redirect_uri,
        })
    }
}

fn parse_or<T>(settings: &Settings, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match settings.get_env_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn settings_with(pairs: &[(&str, &str)]) -> Settings {
        Settings::isolated(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_match_documented_limits() {
        let config = LensConfig::default();
        assert_eq!(config.diff_ceiling, 50_000);
        assert_eq!(config.chat_budget, 75_000);
        assert_eq!(config.max_context_commits, 10);
        assert_eq!(config.github_api_url, "https://api.github.com");
    }

    #[test]
    fn settings_override_numeric_limits() {
        let settings = settings_with(&[
            ("COMMIT_LENS_DIFF_CEILING", "1000"),
            ("COMMIT_LENS_MAX_CONTEXT_COMMITS", "5"),
            ("COMMIT_LENS_CACHE_TTL_SECS", "60"),
        ]);
        let config = LensConfig::from_settings(&settings).unwrap();
        assert_eq!(config.diff_ceiling, 1000);
        assert_eq!(config.max_context_commits, 5);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
    }

    #[test]
    fn zero_commit_cap_is_raised_to_one() {
        let settings = settings_with(&[("COMMIT_LENS_MAX_CONTEXT_COMMITS", "0")]);
        let config = LensConfig::from_settings(&settings).unwrap();
        assert_eq!(config.max_context_commits, 1);
    }

    #[test]
    fn invalid_number_is_an_error() {
        let settings = settings_with(&[("COMMIT_LENS_CHAT_BUDGET", "lots")]);
        let err = LensConfig::from_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("COMMIT_LENS_CHAT_BUDGET"));
    }

    #[test]
    fn oauth_app_debug_redacts_secret() {
        let settings = settings_with(&[
            ("GITHUB_CLIENT_ID", "id-123"),
            ("GITHUB_CLIENT_SECRET", "shh"),
        ]);
        let app = LensConfig::oauth_app(&settings).unwrap();
        assert_eq!(app.redirect_uri, "http://localhost:3000");
        let debug = format!("{app:?}");
        assert!(debug.contains("id-123"));
        assert!(!debug.contains("shh"));
    }
}
